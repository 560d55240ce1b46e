#[macro_export]
#[doc(hidden)]
macro_rules! cfg_std {
    ($($item:item)*) => {
        $(
            #[cfg(feature = "std")]
            #[cfg_attr(docsrs, doc(cfg(feature = "std")))]
            $item
        )*
    }
}

#[macro_export]
#[doc(hidden)]
macro_rules! cfg_xxhash {
    ($($item:item)*) => {
        $(
            #[cfg(feature = "xxhash")]
            #[cfg_attr(docsrs, doc(cfg(feature = "xxhash")))]
            $item
        )*
    }
}

// Event macros compile to nothing unless the `tracing` feature is on.

#[cfg(feature = "tracing")]
macro_rules! sketch_trace {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! sketch_trace {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "tracing")]
macro_rules! sketch_debug {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! sketch_debug {
    ($($arg:tt)*) => {};
}
