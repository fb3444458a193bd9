//! Commands accepted from guild channels.

use onebot::Command;
use tracing::warn;

use crate::message::SourceFlag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Help,
    SubscribeAll,
    UnsubscribeAll,
    Subscribe(SourceFlag),
    Unsubscribe(SourceFlag),
    /// Inject a test message routed as the flag at this index.
    PushTest(usize),
}

/// `(name, alias, description)` for every command.
const COMMANDS: &[(&str, &str, &str)] = &[
    ("help", "啵啵", "show this help"),
    ("subscribe-all", "订阅全部", "subscribe this channel to everything"),
    ("unsubscribe-all", "取消订阅", "remove this guild's subscription"),
    ("sub-bili-live", "b站开播", "subscribe to Bilibili live"),
    ("unsub-bili-live", "取消b站开播", "unsubscribe from Bilibili live"),
    ("sub-bili-dynamic", "b站动态", "subscribe to Bilibili dynamics"),
    ("unsub-bili-dynamic", "取消b站动态", "unsubscribe from Bilibili dynamics"),
    ("sub-douyin-live", "抖音开播", "subscribe to Douyin live"),
    ("unsub-douyin-live", "取消抖音开播", "unsubscribe from Douyin live"),
    ("push-test", "推送测试", "send a test message, optional flag index"),
];

impl BotCommand {
    /// Map a parsed command to a bot action. Unknown names yield `None`.
    pub fn from_command(command: &Command) -> Option<Self> {
        let name = command.name.as_str();
        let canonical = COMMANDS
            .iter()
            .find(|(n, alias, _)| *n == name || *alias == name)
            .map(|(n, _, _)| *n)?;

        Some(match canonical {
            "help" => Self::Help,
            "subscribe-all" => Self::SubscribeAll,
            "unsubscribe-all" => Self::UnsubscribeAll,
            "sub-bili-live" => Self::Subscribe(SourceFlag::BiliLive),
            "unsub-bili-live" => Self::Unsubscribe(SourceFlag::BiliLive),
            "sub-bili-dynamic" => Self::Subscribe(SourceFlag::BiliDynamic),
            "unsub-bili-dynamic" => Self::Unsubscribe(SourceFlag::BiliDynamic),
            "sub-douyin-live" => Self::Subscribe(SourceFlag::DouyinLive),
            "unsub-douyin-live" => Self::Unsubscribe(SourceFlag::DouyinLive),
            _ => Self::PushTest(push_test_index(command.args.first().map(String::as_str))),
        })
    }
}

fn push_test_index(arg: Option<&str>) -> usize {
    match arg {
        None => 0,
        Some(arg) => arg.parse().unwrap_or_else(|_| {
            warn!(arg, "Invalid push-test flag, using 0");
            0
        }),
    }
}

/// Help listing, one command per line.
pub fn help_text() -> String {
    COMMANDS
        .iter()
        .map(|(name, alias, description)| format!("/{name} (/{alias}): {description}"))
        .collect::<Vec<_>>()
        .join("\n")
}
