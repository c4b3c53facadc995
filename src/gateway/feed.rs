//! Newline-delimited JSON event feed

use super::GatewayEvent;
use crate::error::Result;
use crate::platform::InMemoryPlatform;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Read events from `reader` and forward them to `events`
///
/// Blank lines are skipped and undecodable lines are logged and dropped.
/// When `simulator` is set every event is mirrored into it before being
/// forwarded, so that offline runs know the guilds, channels and members the
/// events refer to. Returns the number of events forwarded.
pub async fn read_events<R>(
    reader: R,
    events: mpsc::Sender<GatewayEvent>,
    simulator: Option<&InMemoryPlatform>,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;
    let mut line_number = 0;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = match GatewayEvent::parse(line) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping line {}: {}", line_number, e);
                continue;
            },
        };

        if let Some(simulator) = simulator {
            seed_simulator(simulator, &event);
        }
        if events.send(event).await.is_err() {
            debug!("Dispatcher stopped; no longer reading events");
            break;
        }
        forwarded += 1;
    }

    Ok(forwarded)
}

/// Mirror what an event reveals about the guild into the simulator
pub fn seed_simulator(simulator: &InMemoryPlatform, event: &GatewayEvent) {
    match event {
        GatewayEvent::Ready { guilds } => {
            for guild in guilds {
                simulator.provision_guild(guild.info.clone());
                for channel in &guild.channels {
                    simulator.insert_channel(channel.clone());
                }
            }
        },
        GatewayEvent::Command { interaction, .. } => {
            simulator.observe_member(interaction.guild_id, &interaction.member);
        },
        GatewayEvent::ReactionAdded(_) => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ChannelId, GuildId, User, UserId};
    use crate::platform::ChatPlatform;

    const FEED: &str = r#"
{"type":"ready","guilds":[{"id":"10","name":"Arkeon","owner_id":"2","channels":[{"id":"20","guild_id":"10","name":"support","kind":"text"}]}]}
this is not json
{"type":"command","interaction":{"id":"1","token":"t","guild_id":"10","channel_id":"20","member":{"user":{"id":"3","name":"admin"},"administrator":true}},"command":{"name":"ticket","title":"Support","description":"Aide"}}
"#;

    #[tokio::test]
    async fn test_read_events_skips_invalid_lines_and_seeds_simulator() {
        let simulator = InMemoryPlatform::permissive(User::new(1, "poster-bot"));
        let (tx, mut rx) = mpsc::channel(8);

        let forwarded = read_events(FEED.as_bytes(), tx, Some(&simulator))
            .await
            .unwrap();

        assert_eq!(forwarded, 2);
        assert_eq!(rx.recv().await.unwrap().kind(), "ready");
        assert_eq!(rx.recv().await.unwrap().kind(), "command");
        assert!(rx.recv().await.is_none());

        let guild = simulator.guild(GuildId::new(10)).await.unwrap();
        assert_eq!(guild.owner_id, UserId::new(2));
        assert_eq!(
            simulator.channel(ChannelId::new(20)).await.unwrap().name,
            "support"
        );
        assert!(
            simulator
                .is_administrator(GuildId::new(10), UserId::new(3))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_read_events_stops_when_dispatcher_is_gone() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        let forwarded = read_events(FEED.as_bytes(), tx, None).await.unwrap();

        assert_eq!(forwarded, 0);
    }
}
