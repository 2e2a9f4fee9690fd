use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use shared::domain::{Coord, PieceCode, PromotionRole, SideCaseMapping};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    controller::{Command, ControllerEvent, ControllerState, Effect, Input, Mutation},
    gesture::DropTarget,
    promotion::PromotionMode,
    BoardService, OrientationStore,
};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const COMMAND_QUEUE_CAPACITY: usize = 64;
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub poll_interval: Duration,
    pub promotion_mode: PromotionMode,
    pub mapping: SideCaseMapping,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            promotion_mode: PromotionMode::default(),
            mapping: SideCaseMapping::default(),
        }
    }
}

enum Envelope {
    Command(Command),
    Shutdown,
}

/// Owns the service, the orientation store and the event channel until started.
pub struct BoardController {
    service: Arc<dyn BoardService>,
    store: Arc<dyn OrientationStore>,
    settings: ControllerSettings,
    events: broadcast::Sender<ControllerEvent>,
}

impl BoardController {
    pub fn new(
        service: Arc<dyn BoardService>,
        store: Arc<dyn OrientationStore>,
        settings: ControllerSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            service,
            store,
            settings,
            events,
        }
    }

    /// Subscribe before `start` to see the first render.
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Loads the persisted orientation and spawns the controller task. The first
    /// snapshot fetch goes out immediately.
    pub async fn start(self) -> ControllerHandle {
        let flipped = match self.store.load().await {
            Ok(flipped) => flipped,
            Err(err) => {
                warn!(error = %err, "failed to load board orientation; using default");
                false
            }
        };
        let state = ControllerState::new(
            self.settings.mapping,
            self.settings.promotion_mode,
            flipped,
        );
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let runner = Runner {
            state,
            service: self.service,
            store: self.store,
            events: self.events.clone(),
        };
        info!(
            flipped,
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            promotion_mode = ?self.settings.promotion_mode,
            "starting board controller"
        );
        let task = tokio::spawn(runner.run(cmd_rx, self.settings.poll_interval));
        ControllerHandle {
            commands: cmd_tx,
            events: self.events,
            task,
        }
    }
}

pub struct ControllerHandle {
    commands: mpsc::Sender<Envelope>,
    events: broadcast::Sender<ControllerEvent>,
    task: JoinHandle<()>,
}

impl ControllerHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(Envelope::Command(command))
            .await
            .map_err(|_| anyhow!("board controller is not running"))
    }

    pub async fn pickup(&self, piece: PieceCode, source: Coord) -> Result<()> {
        self.send(Command::Pickup { piece, source }).await
    }

    pub async fn drag_over(&self, over: Coord) -> Result<()> {
        self.send(Command::DragOver { over }).await
    }

    pub async fn drop(&self, target: DropTarget) -> Result<()> {
        self.send(Command::Drop(target)).await
    }

    pub async fn toggle_orientation(&self) -> Result<()> {
        self.send(Command::ToggleOrientation).await
    }

    pub async fn refresh(&self) -> Result<()> {
        self.send(Command::Refresh).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.send(Command::Reset).await
    }

    pub async fn undo(&self) -> Result<()> {
        self.send(Command::Undo).await
    }

    pub async fn fetch_history(&self) -> Result<()> {
        self.send(Command::FetchHistory).await
    }

    pub async fn choose_promotion(&self, role: PromotionRole) -> Result<()> {
        self.send(Command::ChoosePromotion(role)).await
    }

    pub async fn cancel_promotion(&self) -> Result<()> {
        self.send(Command::CancelPromotion).await
    }

    /// Stops polling and waits for the controller task to exit. In-flight
    /// requests finish on their own; their results are dropped.
    pub async fn stop(self) -> Result<()> {
        let _ = self.commands.send(Envelope::Shutdown).await;
        self.task.await.context("board controller task panicked")
    }
}

struct Runner {
    state: ControllerState,
    service: Arc<dyn BoardService>,
    store: Arc<dyn OrientationStore>,
    events: broadcast::Sender<ControllerEvent>,
}

impl Runner {
    async fn run(mut self, mut commands: mpsc::Receiver<Envelope>, poll_interval: Duration) {
        let (completion_tx, mut completions) = mpsc::unbounded_channel::<Input>();
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let input = tokio::select! {
                envelope = commands.recv() => match envelope {
                    Some(Envelope::Command(command)) => Input::Command(command),
                    Some(Envelope::Shutdown) | None => break,
                },
                Some(input) = completions.recv() => input,
                _ = ticker.tick() => Input::PollTick,
            };

            for effect in self.state.handle(input) {
                self.execute(effect, &completion_tx).await;
            }
        }

        info!("board controller stopped");
    }

    async fn execute(&self, effect: Effect, completion_tx: &mpsc::UnboundedSender<Input>) {
        match effect {
            Effect::Emit(event) => {
                // No subscribers is fine.
                let _ = self.events.send(event);
            }
            Effect::PersistOrientation(flipped) => {
                if let Err(err) = self.store.save(flipped).await {
                    warn!(flipped, error = %err, "failed to persist board orientation");
                }
            }
            Effect::SuppressDragDefault(effect) => {
                debug!(?effect, "drag over");
            }
            Effect::FetchSnapshot { seq } => {
                debug!(seq, "fetching snapshot");
                let service = Arc::clone(&self.service);
                let tx = completion_tx.clone();
                tokio::spawn(async move {
                    let result = service.fetch_snapshot().await;
                    let _ = tx.send(Input::SnapshotLoaded { seq, result });
                });
            }
            Effect::Submit { seq, mutation } => {
                debug!(seq, operation = %mutation.operation(), "submitting");
                let service = Arc::clone(&self.service);
                let tx = completion_tx.clone();
                tokio::spawn(async move {
                    let result = match &mutation {
                        Mutation::Move(request) | Mutation::PromotionMove(request) => {
                            service.submit_move(request).await
                        }
                        Mutation::FinalizePromotion(request) => {
                            service.finalize_promotion(request).await
                        }
                        Mutation::Reset => service.reset().await,
                        Mutation::Undo => service.undo().await,
                    };
                    let _ = tx.send(Input::MutationCompleted {
                        seq,
                        mutation,
                        result,
                    });
                });
            }
            Effect::FetchHistory => {
                let service = Arc::clone(&self.service);
                let tx = completion_tx.clone();
                tokio::spawn(async move {
                    let result = service.history().await;
                    let _ = tx.send(Input::HistoryLoaded(result));
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
