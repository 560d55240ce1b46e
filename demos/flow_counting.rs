use funnelsketch::{FunnelSketch, Tier};

fn flow(src: [u8; 4], dst: [u8; 4], sport: u16, dport: u16, proto: u8) -> Vec<u8> {
    let mut k = Vec::with_capacity(13);
    k.extend_from_slice(&src);
    k.extend_from_slice(&dst);
    k.extend_from_slice(&sport.to_be_bytes());
    k.extend_from_slice(&dport.to_be_bytes());
    k.push(proto);
    k
}

fn main() {
    let mut sketch = FunnelSketch::builder()
        .set_light_layers(3)
        .set_middle_layers(2)
        .set_light_counters(1 << 12)
        .set_buckets(256)
        .set_heavy_counters(64)
        .set_bucket_8bit_len(8)
        .set_bucket_16bit_len(4)
        .finalize()
        .unwrap();

    let dns = flow([10, 0, 0, 2], [8, 8, 8, 8], 5353, 53, 17);
    let https = flow([10, 0, 0, 3], [1, 1, 1, 1], 40000, 443, 6);

    // a handful of DNS packets stay in the 4-bit tier
    for _ in 0..9 {
        sketch.increment(&dns);
    }
    assert_eq!(sketch.query_with_tier(&dns), (9, Tier::Light));

    // one bulk transfer walks down the funnel
    sketch.insert(&https, 100);
    let (estimate, tier) = sketch.query_with_tier(&https);
    assert!(estimate >= 100);
    assert_eq!(tier, Tier::Byte);

    sketch.insert(&https, 1_000);
    let (estimate, tier) = sketch.query_with_tier(&https);
    assert!(estimate >= 1_100);
    assert_eq!(tier, Tier::KeyValue);

    println!("dns: {}, https: {} ({:?})", sketch.query(&dns), estimate, tier);
    println!("sketch uses {} bytes", sketch.size_bytes());
}
