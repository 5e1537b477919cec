mod frame_proptest;
mod sink;
mod timestamp;

#[cfg(feature = "tokio-runtime")]
mod source;
