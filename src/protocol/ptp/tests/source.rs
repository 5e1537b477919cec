use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::UdpSocket;

use crate::error::PtpError;
use crate::protocol::ptp::frame::Frame;
use crate::protocol::ptp::source::{FrameSource, StreamFrameSource, UdpFrameSource};
use crate::protocol::ptp::timestamp::Timestamp;

fn fixed_clock() -> Timestamp {
    Timestamp::from_nanos(42_000)
}

// ===== UDP =====

#[tokio::test]
async fn test_udp_source_reads_and_stamps() {
    let mut source = UdpFrameSource::bind("127.0.0.1:0")
        .await
        .unwrap()
        .with_clock(fixed_clock);
    let addr = source.local_addr().unwrap();

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender
        .send_to(&Frame::follow_up(9, 777).encode(), addr)
        .await
        .unwrap();

    let (frame, received) = source.read_frame().await.unwrap();
    assert_eq!(frame, Frame::follow_up(9, 777));
    assert_eq!(received, Timestamp::from_nanos(42_000));
    assert_eq!(source.last_peer(), Some(sender.local_addr().unwrap()));
}

#[tokio::test]
async fn test_udp_source_short_datagram_is_malformed() {
    let mut source = UdpFrameSource::bind("127.0.0.1:0").await.unwrap();
    let addr = source.local_addr().unwrap();

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(&[0x00, 0x01], addr).await.unwrap();

    assert!(matches!(
        source.read_frame().await,
        Err(PtpError::MalformedFrame { have: 2, .. })
    ));
}

#[tokio::test]
async fn test_udp_source_send_frame() {
    let receiver = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let mut peer = UdpFrameSource::from_socket(Arc::clone(&receiver));

    let source = UdpFrameSource::bind("127.0.0.1:0")
        .await
        .unwrap()
        .with_clock(fixed_clock);
    let sent_at = source
        .send_frame(Frame::delay_req(3), receiver.local_addr().unwrap())
        .await
        .unwrap();
    assert_eq!(sent_at, Timestamp::from_nanos(42_000));

    let (frame, _) = peer.read_frame().await.unwrap();
    assert_eq!(frame, Frame::delay_req(3));
}

// ===== Byte stream =====

#[tokio::test]
async fn test_stream_source_reads_back_to_back() {
    let (mut writer, reader) = tokio::io::duplex(64);
    let mut source = StreamFrameSource::new(reader).with_clock(fixed_clock);

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&Frame::sync(1).encode());
    bytes.extend_from_slice(&Frame::follow_up(1, 5).encode());
    writer.write_all(&bytes).await.unwrap();
    drop(writer);

    assert_eq!(source.read_frame().await.unwrap().0, Frame::sync(1));
    let (frame, at) = source.read_frame().await.unwrap();
    assert_eq!(frame, Frame::follow_up(1, 5));
    assert_eq!(at, Timestamp::from_nanos(42_000));
    assert!(matches!(
        source.read_frame().await,
        Err(PtpError::SourceClosed)
    ));
}

#[tokio::test]
async fn test_stream_source_truncated_tail() {
    let (mut writer, reader) = tokio::io::duplex(64);
    let mut source = StreamFrameSource::new(reader);

    writer.write_all(&Frame::sync(1).encode()).await.unwrap();
    writer.write_all(&[0x01, 0x00, 0x01]).await.unwrap();
    drop(writer);

    assert!(source.read_frame().await.is_ok());
    assert!(matches!(
        source.read_frame().await,
        Err(PtpError::MalformedFrame { have: 3, .. })
    ));
}

#[tokio::test]
async fn test_boxed_source_forwards() {
    let (mut writer, reader) = tokio::io::duplex(64);
    let mut source: Box<dyn FrameSource> = Box::new(StreamFrameSource::new(reader));

    writer
        .write_all(&Frame::delay_req(2).encode())
        .await
        .unwrap();
    assert_eq!(source.read_frame().await.unwrap().0, Frame::delay_req(2));
}
