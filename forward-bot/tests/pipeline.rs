use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use feed_platforms::LiveRoomInfo;
use forward_bot::bot::BotListener;
use forward_bot::message::SourceFlag;
use forward_bot::monitor::{LiveFetcher, LivePoller, PollerConfig, test_source};
use forward_bot::notification::channels::OneBotChannel;
use forward_bot::notification::{NotificationService, NotificationServiceConfig};
use forward_bot::subscription::SubscriptionTable;
use futures::{SinkExt, StreamExt};
use onebot::{OneBotClient, OneBotConfig};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);
const SELF_ID: &str = "42";

/// Reports the room offline until switched on.
struct SwitchFetcher {
    live: Arc<AtomicBool>,
}

#[async_trait]
impl LiveFetcher for SwitchFetcher {
    type Key = u64;

    fn source(&self) -> SourceFlag {
        SourceFlag::BiliLive
    }

    async fn fetch(&self, room: &u64) -> feed_platforms::Result<LiveRoomInfo> {
        Ok(LiveRoomInfo {
            user_id: room.to_string(),
            user_name: format!("user{room}"),
            room_id: room.to_string(),
            is_live: self.live.load(Ordering::SeqCst),
            title: "evening stream".to_string(),
            cover: "cover.jpg".to_string(),
            area: None,
            link: format!("https://live.bilibili.com/{room}"),
        })
    }
}

/// Fake bot endpoint. Frames queued on the returned sender are pushed to the
/// client; every text frame from the client comes out of the receiver.
async fn spawn_server() -> (String, mpsc::Sender<String>, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (push_tx, mut push_rx) = mpsc::channel::<String>(8);
    let (frame_tx, frame_rx) = mpsc::channel(8);

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        loop {
            tokio::select! {
                outgoing = push_rx.recv() => match outgoing {
                    Some(text) => ws.send(Message::text(text)).await.unwrap(),
                    None => break,
                },
                incoming = ws.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if frame_tx.send(text.to_string()).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    _ => break,
                },
            }
        }
    });

    (url, push_tx, frame_rx)
}

fn guild_message(text: &str) -> String {
    json!({
        "post_type": "message",
        "message_type": "guild",
        "sub_type": "channel",
        "time": 1,
        "self_tiny_id": SELF_ID,
        "guild_id": "7",
        "channel_id": "8",
        "message_id": "m",
        "message": format!("[CQ:at,qq={SELF_ID}] {text}"),
        "sender": { "user_id": "9" }
    })
    .to_string()
}

async fn next_message(frames: &mut mpsc::Receiver<String>) -> String {
    let raw = timeout(WAIT, frames.recv()).await.unwrap().unwrap();
    let action: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(action["action"], "send_guild_channel_msg");
    assert_eq!(action["params"]["guild_id"], 7);
    assert_eq!(action["params"]["channel_id"], 8);
    action["params"]["message"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_subscribe_then_receive_live_notice() {
    let (url, push, mut frames) = spawn_server().await;
    let cancel = CancellationToken::new();

    let config = OneBotConfig {
        url,
        ..Default::default()
    };
    let (client, events, connection) = OneBotClient::spawn(config, cancel.child_token()).unwrap();
    let table = Arc::new(SubscriptionTable::new());
    let (test, trigger) = test_source();
    let live = Arc::new(AtomicBool::new(false));

    let mut service = NotificationService::new(NotificationServiceConfig::default());
    service.add_source(Box::new(LivePoller::new(
        SwitchFetcher { live: live.clone() },
        vec![1],
        PollerConfig {
            interval: Duration::from_millis(50),
            entity_delay: Duration::ZERO,
        },
    )));
    service.add_source(Box::new(test));
    service.add_channel(Arc::new(OneBotChannel::new(client.clone(), table.clone())));
    let listener = BotListener::new(client, table.clone(), Some(trigger), Duration::from_secs(20));

    let service = tokio::spawn(service.run(cancel.clone()));
    let listener = tokio::spawn(listener.run(events, cancel.clone()));

    push.send(guild_message("/b站开播")).await.unwrap();
    assert_eq!(next_message(&mut frames).await, "subscribed");
    assert_eq!(table.targets(SourceFlag::BiliLive), vec![(7, 8)]);

    live.store(true, Ordering::SeqCst);
    let notice = next_message(&mut frames).await;
    assert!(notice.contains("user1 went live"), "{notice}");
    assert!(notice.contains("title: \"evening stream\""));
    assert!(notice.contains("https://live.bilibili.com/1"));
    assert!(notice.ends_with("[CQ:image,file=cover.jpg]"));

    push.send(guild_message("/推送测试")).await.unwrap();
    let test_notice = next_message(&mut frames).await;
    assert!(test_notice.contains("test message, flag=0"), "{test_notice}");

    push.send(guild_message("/取消b站开播")).await.unwrap();
    assert_eq!(next_message(&mut frames).await, "unsubscribed");
    assert!(table.is_empty());

    cancel.cancel();
    timeout(WAIT, service).await.unwrap().unwrap();
    timeout(WAIT, listener).await.unwrap().unwrap();
    timeout(WAIT, connection).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unsubscribed_guild_gets_nothing() {
    let (url, push, mut frames) = spawn_server().await;
    let cancel = CancellationToken::new();

    let config = OneBotConfig {
        url,
        ..Default::default()
    };
    let (client, events, connection) = OneBotClient::spawn(config, cancel.child_token()).unwrap();
    let table = Arc::new(SubscriptionTable::new());
    let (test, trigger) = test_source();

    let mut service = NotificationService::new(NotificationServiceConfig::default());
    service.add_source(Box::new(test));
    service.add_channel(Arc::new(OneBotChannel::new(client.clone(), table.clone())));
    let stats = service.stats();
    let listener = BotListener::new(client, table, Some(trigger), Duration::from_secs(20));

    let service = tokio::spawn(service.run(cancel.clone()));
    let listener = tokio::spawn(listener.run(events, cancel.clone()));

    // douyin subscription does not receive a bili-dynamic push test
    push.send(guild_message("/抖音开播")).await.unwrap();
    assert_eq!(next_message(&mut frames).await, "subscribed");
    push.send(guild_message("/推送测试 1")).await.unwrap();
    push.send(guild_message("/help")).await.unwrap();

    let help = next_message(&mut frames).await;
    assert!(help.starts_with("[CQ:at,qq=9]"), "{help}");
    timeout(WAIT, async {
        while stats.delivered() < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(stats.received(), 1);
    assert!(frames.try_recv().is_err());

    cancel.cancel();
    timeout(WAIT, service).await.unwrap().unwrap();
    timeout(WAIT, listener).await.unwrap().unwrap();
    timeout(WAIT, connection).await.unwrap().unwrap();
}
