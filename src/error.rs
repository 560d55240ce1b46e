use core::fmt::{Debug, Display, Formatter};

/// `FunnelSketchError` contains the configuration errors of [`FunnelSketch`].
///
/// [`FunnelSketch`]: struct.FunnelSketch.html
#[derive(Copy, Clone, PartialEq)]
pub enum FunnelSketchError {
    /// Light or middle layer count is zero or above [`MAX_LAYERS`]
    ///
    /// [`MAX_LAYERS`]: constant.MAX_LAYERS.html
    InvalidLayers(usize),
    /// Number of 4-bit counters per light layer is zero
    InvalidLightCounters(usize),
    /// Number of buckets per middle layer is zero
    InvalidBuckets(usize),
    /// Number of 32-bit counters in the heavy array is zero
    InvalidHeavyCounters(usize),
    /// Length of the 8-bit counter array in each bucket is zero
    InvalidBucket8BitLen(usize),
    /// Length of the 16-bit counter array in each bucket is zero
    InvalidBucket16BitLen(usize),
    /// Key capacity of the key-value slots is zero
    InvalidKeyCapacity(usize),
    /// Promotion threshold ratio is not a positive finite number
    InvalidThresholdRatio(f64),
}

impl FunnelSketchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            FunnelSketchError::InvalidLayers(v) => write!(
                f,
                "invalid number of layers: {}, which should be in range [1, {}]",
                *v,
                crate::MAX_LAYERS
            ),
            FunnelSketchError::InvalidLightCounters(v) => {
                write!(f, "invalid number of light counters: {}", *v)
            }
            FunnelSketchError::InvalidBuckets(v) => write!(f, "invalid number of buckets: {}", *v),
            FunnelSketchError::InvalidHeavyCounters(v) => {
                write!(f, "invalid heavy array size: {}", *v)
            }
            FunnelSketchError::InvalidBucket8BitLen(v) => {
                write!(f, "invalid 8-bit array length per bucket: {}", *v)
            }
            FunnelSketchError::InvalidBucket16BitLen(v) => {
                write!(f, "invalid 16-bit array length per bucket: {}", *v)
            }
            FunnelSketchError::InvalidKeyCapacity(v) => write!(f, "invalid key capacity: {}", *v),
            FunnelSketchError::InvalidThresholdRatio(v) => write!(
                f,
                "invalid threshold ratio: {}, which should be a positive finite number",
                *v
            ),
        }
    }
}

impl Display for FunnelSketchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        self.fmt(f)
    }
}

impl Debug for FunnelSketchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        self.fmt(f)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FunnelSketchError {}

#[cfg(test)]
mod test {
    use super::FunnelSketchError;
    use std::format;

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!("{}", FunnelSketchError::InvalidBuckets(0)),
            "invalid number of buckets: 0"
        );
        assert_eq!(
            format!("{:?}", FunnelSketchError::InvalidLayers(33)),
            "invalid number of layers: 33, which should be in range [1, 32]"
        );
    }
}
