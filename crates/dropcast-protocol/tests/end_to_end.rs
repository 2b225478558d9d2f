//! End-to-end sender/receiver scenarios, wired together over the
//! in-memory [`DataChannel`] from the `test-util` feature.

use std::sync::Arc;
use std::time::Duration;

use dropcast_protocol::channel::test_util::{CapturedFrame, MemoryChannel};
use dropcast_protocol::progress::NullObserver;
use dropcast_protocol::receiver::Receiver;
use dropcast_protocol::sender::{QueuedFile, Sender};

async fn drive_through_receiver(
    mut rx: dropcast_protocol::channel::test_util::MemoryChannelRx,
) -> Vec<dropcast_protocol::ReceivedFile> {
    // The receiver's own chunk-acks are sent over a second, unobserved
    // channel here: this harness only cares about the reassembled files.
    let (ack_channel, _acks) = MemoryChannel::pair();
    let mut receiver = Receiver::new(Arc::new(ack_channel), Arc::new(NullObserver));
    let mut finished = Vec::new();
    while let Ok(Some(frame)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
        match frame {
            CapturedFrame::Text(json) => {
                if let Some(file) = receiver.on_control_frame(&json).unwrap() {
                    finished.push(file);
                }
            }
            CapturedFrame::Binary(bytes) => {
                receiver.on_binary_frame(&bytes).await.unwrap();
            }
        }
    }
    finished
}

#[tokio::test]
async fn single_file_round_trips_exactly() {
    let (channel, rx) = MemoryChannel::pair();
    let sender = Sender::new(Arc::new(channel), Arc::new(NullObserver));

    let original = (0..100_000u32).map(|i| (i % 256) as u8).collect::<Vec<u8>>();
    let file = QueuedFile {
        name: "photo.jpg".into(),
        mime_type: "image/jpeg".into(),
        last_modified: 1_700_000_000_000,
        data: original.clone(),
    };

    let send = tokio::spawn(async move { sender.send_one_file(&file).await });
    let received = drive_through_receiver(rx).await;
    send.await.unwrap().unwrap();

    assert_eq!(received.len(), 1);
    assert_eq!(received[0].name, "photo.jpg");
    assert_eq!(received[0].data, original);
    assert!(!received[0].degraded);
}

#[tokio::test]
async fn queue_of_files_arrives_in_order() {
    let (channel, rx) = MemoryChannel::pair();
    let sender = Sender::new(Arc::new(channel), Arc::new(NullObserver));

    let files = vec![
        QueuedFile {
            name: "first.txt".into(),
            mime_type: "text/plain".into(),
            last_modified: 0,
            data: b"hello".to_vec(),
        },
        QueuedFile {
            name: "second.txt".into(),
            mime_type: "text/plain".into(),
            last_modified: 0,
            data: b"world".to_vec(),
        },
    ];

    let send = tokio::spawn(async move { sender.send_files(&files).await });
    let received = drive_through_receiver(rx).await;
    send.await.unwrap().unwrap();

    assert_eq!(received.len(), 2);
    assert_eq!(received[0].name, "first.txt");
    assert_eq!(received[0].data, b"hello");
    assert_eq!(received[1].name, "second.txt");
    assert_eq!(received[1].data, b"world");
}

#[tokio::test]
async fn empty_file_completes_with_zero_chunks_of_data() {
    let (channel, rx) = MemoryChannel::pair();
    let sender = Sender::new(Arc::new(channel), Arc::new(NullObserver));

    let file = QueuedFile {
        name: "empty.txt".into(),
        mime_type: "text/plain".into(),
        last_modified: 0,
        data: Vec::new(),
    };

    let send = tokio::spawn(async move { sender.send_one_file(&file).await });
    let received = drive_through_receiver(rx).await;
    send.await.unwrap().unwrap();

    assert_eq!(received.len(), 1);
    assert_eq!(received[0].data, Vec::<u8>::new());
    assert!(!received[0].degraded);
}
