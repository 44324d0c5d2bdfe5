use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, tcp::OwnedReadHalf, tcp::OwnedWriteHalf};
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use grid_agent_core::agent::reasoning::BoxFuture;
use grid_agent_core::agent::{
    AgentLoop, ClickData, FileBrainStore, Frame, GameApi, GameState, LlmReasoner,
    ReasonerConfig, TurnAction, run_session,
};
use grid_agent_core::config::{AgentConfig, ConfigLoader};
use grid_agent_core::llm::{OllamaClient, OllamaConfig};

/// Frame as the game client sends it: a stack of grid layers, of which the agent only looks
/// at the first.
#[derive(Debug, Default, Deserialize)]
struct FrameWire {
    #[serde(default)]
    guid: String,
    #[serde(default)]
    frame: Vec<Vec<Vec<u8>>>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    state: GameState,
}

impl From<FrameWire> for Frame {
    fn from(wire: FrameWire) -> Self {
        Frame {
            guid: wire.guid,
            grid: wire.frame.into_iter().next().unwrap_or_default(),
            score: wire.score,
            state: wire.state,
        }
    }
}

#[derive(Debug, Serialize)]
struct ActionWire<'a> {
    name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<ClickData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<&'a str>,
}

impl<'a> ActionWire<'a> {
    fn from_turn(turn: &'a TurnAction) -> Self {
        Self {
            name: turn.action.name(),
            data: turn.action.data(),
            reasoning: turn.reasoning.as_deref(),
        }
    }
}

struct ControlConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Game client reached over a line-delimited JSON control port.
struct RemoteGameApi {
    conn: Mutex<ControlConn>,
}

impl RemoteGameApi {
    async fn connect(addr: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connect control port {addr}"))?;
        let (read, write) = stream.into_split();
        Ok(Self {
            conn: Mutex::new(ControlConn {
                reader: BufReader::new(read),
                writer: write,
            }),
        })
    }

    async fn request_json(&self, req: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let line = format!("{req}\n");
        let mut conn = self.conn.lock().await;
        conn.writer
            .write_all(line.as_bytes())
            .await
            .context("control write")?;
        conn.writer.flush().await.context("control flush")?;

        let mut resp_line = String::new();
        let n = conn
            .reader
            .read_line(&mut resp_line)
            .await
            .context("control read")?;
        if n == 0 {
            anyhow::bail!("control connection closed");
        }
        serde_json::from_str(resp_line.trim()).context("invalid control json response")
    }

    async fn request_frame(&self, req: serde_json::Value) -> anyhow::Result<Frame> {
        let v = self.request_json(req).await?;
        if v.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            anyhow::bail!("control request failed: {v}");
        }
        let frame = v
            .get("frame")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("missing frame in response"))?;
        let wire: FrameWire = serde_json::from_value(frame).context("decode frame")?;
        Ok(wire.into())
    }

    fn action_request(turn: &TurnAction) -> serde_json::Value {
        json!({ "op": "action", "action": ActionWire::from_turn(turn) })
    }
}

impl GameApi for RemoteGameApi {
    fn observe<'a>(&'a self) -> BoxFuture<'a, anyhow::Result<Frame>> {
        Box::pin(async move { self.request_frame(json!({ "op": "frame" })).await })
    }

    fn submit<'a>(&'a self, action: TurnAction) -> BoxFuture<'a, anyhow::Result<Frame>> {
        Box::pin(async move { self.request_frame(Self::action_request(&action)).await })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let control_addr = env_or("GRID_AGENT_CONTROL_ADDR", "127.0.0.1:7878");
    let endpoint = env_or("GRID_AGENT_LLM_ENDPOINT", "http://127.0.0.1:11434/api/generate");
    let model = env_or("GRID_AGENT_LLM_MODEL", "llama3");
    let game_id = env_or("GRID_AGENT_GAME_ID", "default");

    let cfg: AgentConfig = match std::env::var("GRID_AGENT_CONFIG") {
        Ok(path) if !path.trim().is_empty() => ConfigLoader::parse_from_file(&path)?,
        _ => AgentConfig::default(),
    };
    info!(%game_id, %control_addr, %model, ?cfg, "starting agent");

    let api = RemoteGameApi::connect(&control_addr).await?;
    let reasoner = LlmReasoner::new(
        OllamaClient::new(OllamaConfig { endpoint, model }),
        ReasonerConfig {
            timeout: cfg.reasoning_timeout(),
            enable_repair: cfg.enable_repair,
            ..ReasonerConfig::default()
        },
    );
    let store = FileBrainStore::new(cfg.brain_dir.clone());

    let mut agent = AgentLoop::new(game_id, cfg, Box::new(store));
    let report = run_session(&mut agent, &api, &reasoner).await?;
    info!(?report, "done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_agent_core::agent::GameAction;
    use tokio::net::TcpListener;

    #[test]
    fn frame_wire_keeps_first_layer() {
        let wire: FrameWire = serde_json::from_value(json!({
            "guid": "abc",
            "frame": [[[1, 2], [3, 4]], [[9, 9], [9, 9]]],
            "score": 2,
            "state": "NOT_FINISHED",
        }))
        .unwrap();
        let frame: Frame = wire.into();
        assert_eq!(frame.grid, vec![vec![1, 2], vec![3, 4]]);
        assert_eq!(frame.state, GameState::NotFinished);
        assert_eq!(frame.score, 2);
    }

    #[test]
    fn frame_without_layers_has_no_grid() {
        let wire: FrameWire = serde_json::from_value(json!({ "state": "NOT_PLAYED" })).unwrap();
        let frame: Frame = wire.into();
        assert!(!frame.has_grid());
    }

    #[test]
    fn click_actions_carry_coordinates() {
        let turn = TurnAction {
            action: GameAction::Action6(ClickData { x: 3, y: 60 }),
            reasoning: None,
        };
        let v = RemoteGameApi::action_request(&turn);
        assert_eq!(v["op"], "action");
        assert_eq!(v["action"]["name"], "ACTION6");
        assert_eq!(v["action"]["data"], json!({ "x": 3, "y": 60 }));
        assert!(v["action"].get("reasoning").is_none());

        let turn = TurnAction {
            action: GameAction::Reset,
            reasoning: Some("why".into()),
        };
        let v = RemoteGameApi::action_request(&turn);
        assert_eq!(v["action"]["name"], "RESET");
        assert!(v["action"].get("data").is_none());
        assert_eq!(v["action"]["reasoning"], "why");
    }

    #[tokio::test]
    async fn remote_api_round_trips_over_tcp() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?.to_string();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();
            let mut seen = Vec::new();
            while let Some(line) = lines.next_line().await.unwrap() {
                let req: serde_json::Value = serde_json::from_str(&line).unwrap();
                seen.push(req);
                let resp = json!({
                    "ok": true,
                    "frame": { "guid": "g", "frame": [[[seen.len() as u8]]], "state": "NOT_FINISHED" },
                });
                write.write_all(format!("{resp}\n").as_bytes()).await.unwrap();
            }
            seen
        });

        let api = RemoteGameApi::connect(&addr).await?;
        let first = api.observe().await?;
        assert_eq!(first.grid, vec![vec![1]]);
        let second = api.submit(TurnAction::new(GameAction::Action2)).await?;
        assert_eq!(second.grid, vec![vec![2]]);
        drop(api);

        let seen = server.await?;
        assert_eq!(seen[0]["op"], "frame");
        assert_eq!(seen[1]["action"]["name"], "ACTION2");
        Ok(())
    }
}
