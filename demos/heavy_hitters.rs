use funnelsketch::FunnelSketch;
use rand::{thread_rng, Rng};

fn main() {
    let mut sketch = FunnelSketch::builder()
        .set_light_layers(3)
        .set_middle_layers(2)
        .set_light_counters(1 << 14)
        .set_buckets(512)
        .set_heavy_counters(256)
        .set_bucket_8bit_len(8)
        .set_bucket_16bit_len(4)
        .set_threshold_ratio(2.0)
        .finalize()
        .unwrap();

    let mut rng = thread_rng();
    for _ in 0..200_000 {
        // 5 elephants share half the traffic with 10k mice
        let key = if rng.gen_bool(0.5) {
            format!("elephant-{}", rng.gen_range(0..5))
        } else {
            format!("mouse-{}", rng.gen_range(0..10_000))
        };
        sketch.increment(key.as_bytes());
    }

    let mut hitters: Vec<(String, u32)> = sketch
        .heavy_hitters()
        .map(|(k, v)| (String::from_utf8_lossy(k).into_owned(), v))
        .collect();
    hitters.sort_by(|a, b| b.1.cmp(&a.1));

    for (key, estimate) in hitters.iter().take(10) {
        println!("{:>16}: {}", key, estimate);
    }
    for i in 0..5 {
        let key = format!("elephant-{}", i);
        assert!(hitters.iter().any(|(k, _)| *k == key));
    }
}
