//! Controller state and its transitions.
//!
//! [`ControllerState::handle`] is the only place state changes. It never does
//! I/O; it returns [`Effect`]s that the runtime carries out, and network
//! completions come back in as [`Input`]s. Every fetch and mutation gets a
//! sequence number when it is issued, and a snapshot is applied only if its
//! number is above the last applied one, so a slow poll can never overwrite a
//! fresher board.

use std::fmt;

use chrono::{DateTime, Utc};
use shared::{
    domain::{Coord, PieceCode, PromotionRole, SideCaseMapping},
    protocol::{
        HistoryEntry, MoveRequest, MoveResult, PromotionFinalizeRequest, SnapshotResponse,
    },
};
use tracing::{debug, info, warn};

use crate::{
    gesture::{DragController, DragState, DropEffect, DropTarget},
    promotion::{PendingPromotion, PromotionAction, PromotionFlow, PromotionMode},
    render::{render_board, BoardView},
    ClientError,
};

/// User-facing actions accepted by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Pickup { piece: PieceCode, source: Coord },
    DragOver { over: Coord },
    Drop(DropTarget),
    ToggleOrientation,
    Refresh,
    Reset,
    Undo,
    FetchHistory,
    ChoosePromotion(PromotionRole),
    CancelPromotion,
}

#[derive(Debug)]
pub enum Input {
    Command(Command),
    PollTick,
    SnapshotLoaded {
        seq: u64,
        result: Result<SnapshotResponse, ClientError>,
    },
    MutationCompleted {
        seq: u64,
        mutation: Mutation,
        result: Result<MoveResult, ClientError>,
    },
    HistoryLoaded(Result<Vec<HistoryEntry>, ClientError>),
}

impl From<Command> for Input {
    fn from(command: Command) -> Self {
        Input::Command(command)
    }
}

/// State-changing request sent to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Move(MoveRequest),
    PromotionMove(MoveRequest),
    FinalizePromotion(PromotionFinalizeRequest),
    Reset,
    Undo,
}

impl Mutation {
    pub fn operation(&self) -> Operation {
        match self {
            Mutation::Move(_) => Operation::Move,
            Mutation::PromotionMove(_) | Mutation::FinalizePromotion(_) => Operation::Promotion,
            Mutation::Reset => Operation::Reset,
            Mutation::Undo => Operation::Undo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Move,
    Promotion,
    Reset,
    Undo,
}

impl Operation {
    pub fn rejection_notice(self) -> &'static str {
        match self {
            Operation::Move => "Invalid move!",
            Operation::Promotion => "Promotion was rejected.",
            Operation::Reset => "There is a problem resetting the board.",
            Operation::Undo => "There is no move to undo.",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Move => "move",
            Operation::Promotion => "promotion",
            Operation::Reset => "reset",
            Operation::Undo => "undo",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    Rendered {
        view: BoardView,
        seq: u64,
        received_at: DateTime<Utc>,
    },
    OrientationChanged {
        flipped: bool,
    },
    /// Blocking notice: the service refused the operation.
    Rejected {
        operation: Operation,
    },
    PromotionOpened {
        target: Coord,
    },
    PromotionClosed,
    History(Vec<HistoryEntry>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchSnapshot { seq: u64 },
    Submit { seq: u64, mutation: Mutation },
    FetchHistory,
    PersistOrientation(bool),
    SuppressDragDefault(DropEffect),
    Emit(ControllerEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AppliedSnapshot {
    response: SnapshotResponse,
    seq: u64,
    received_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ControllerState {
    mapping: SideCaseMapping,
    promotion_mode: PromotionMode,
    flipped: bool,
    next_seq: u64,
    applied_seq: u64,
    snapshot: Option<AppliedSnapshot>,
    view: Option<BoardView>,
    drag: DragController,
    promotion: PromotionFlow,
}

impl ControllerState {
    pub fn new(mapping: SideCaseMapping, promotion_mode: PromotionMode, flipped: bool) -> Self {
        Self {
            mapping,
            promotion_mode,
            flipped,
            next_seq: 0,
            applied_seq: 0,
            snapshot: None,
            view: None,
            drag: DragController::default(),
            promotion: PromotionFlow::Closed,
        }
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    pub fn view(&self) -> Option<&BoardView> {
        self.view.as_ref()
    }

    pub fn snapshot(&self) -> Option<&SnapshotResponse> {
        self.snapshot.as_ref().map(|applied| &applied.response)
    }

    pub fn applied_seq(&self) -> u64 {
        self.applied_seq
    }

    pub fn drag_state(&self) -> DragState {
        self.drag.state()
    }

    pub fn promotion(&self) -> &PromotionFlow {
        &self.promotion
    }

    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        match input {
            Input::Command(command) => self.handle_command(command),
            Input::PollTick => vec![self.fetch()],
            Input::SnapshotLoaded { seq, result } => self.on_snapshot(seq, result),
            Input::MutationCompleted {
                seq,
                mutation,
                result,
            } => self.on_mutation(seq, mutation, result),
            Input::HistoryLoaded(Ok(entries)) => {
                vec![Effect::Emit(ControllerEvent::History(entries))]
            }
            Input::HistoryLoaded(Err(err)) => {
                warn!(error = %err, "history fetch failed");
                Vec::new()
            }
        }
    }

    fn handle_command(&mut self, command: Command) -> Vec<Effect> {
        match command {
            Command::Pickup { piece, source } => {
                self.pickup(piece, source);
                Vec::new()
            }
            Command::DragOver { .. } => vec![Effect::SuppressDragDefault(self.drag.drag_over())],
            Command::Drop(target) => self.drop(target),
            Command::ToggleOrientation => self.toggle_orientation(),
            Command::Refresh => vec![self.fetch()],
            Command::Reset => self.begin_board_mutation(Mutation::Reset),
            Command::Undo => self.begin_board_mutation(Mutation::Undo),
            Command::FetchHistory => vec![Effect::FetchHistory],
            Command::ChoosePromotion(role) => self.choose_promotion(role),
            Command::CancelPromotion => self.cancel_promotion(),
        }
    }

    fn issue_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn fetch(&mut self) -> Effect {
        Effect::FetchSnapshot {
            seq: self.issue_seq(),
        }
    }

    fn submit(&mut self, mutation: Mutation) -> Effect {
        Effect::Submit {
            seq: self.issue_seq(),
            mutation,
        }
    }

    /// A refused pickup still ends the previous gesture, so a later drop has nothing to submit.
    fn pickup(&mut self, piece: PieceCode, source: Coord) {
        if self.promotion.is_open() {
            self.drag.cancel();
            debug!(%source, "pickup ignored while promotion is open");
            return;
        }
        let allowed = self
            .view
            .as_ref()
            .is_some_and(|view| view.is_draggable(source, piece));
        if allowed {
            self.drag.pickup(piece, source);
        } else {
            self.drag.cancel();
            debug!(%source, piece = %piece, "pickup ignored for non-draggable piece");
        }
    }

    fn drop(&mut self, target: DropTarget) -> Vec<Effect> {
        if self.promotion.is_open() {
            self.drag.cancel();
            return Vec::new();
        }
        let Some(request) = self.drag.drop(target) else {
            return Vec::new();
        };

        if self.promotion_mode == PromotionMode::Atomic
            && self.mapping.is_promotion_move(request.piece, request.target)
        {
            let target = request.target;
            self.promotion
                .open(PendingPromotion::BeforeMove { request });
            return vec![Effect::Emit(ControllerEvent::PromotionOpened { target })];
        }

        vec![self.submit(Mutation::Move(request))]
    }

    fn toggle_orientation(&mut self) -> Vec<Effect> {
        self.flipped = !self.flipped;
        let mut effects = vec![
            Effect::PersistOrientation(self.flipped),
            Effect::Emit(ControllerEvent::OrientationChanged {
                flipped: self.flipped,
            }),
        ];
        if let Some(applied) = self.snapshot.clone() {
            effects.push(self.render(&applied));
        }
        effects
    }

    fn begin_board_mutation(&mut self, mutation: Mutation) -> Vec<Effect> {
        self.drag.cancel();
        let mut effects = Vec::new();
        if self.promotion.cancel().is_some() {
            effects.push(Effect::Emit(ControllerEvent::PromotionClosed));
        }
        effects.push(self.submit(mutation));
        effects
    }

    fn choose_promotion(&mut self, role: PromotionRole) -> Vec<Effect> {
        let Some(action) = self.promotion.choose(role, &self.mapping) else {
            return Vec::new();
        };
        let mutation = match action {
            PromotionAction::SubmitMove(request) => Mutation::PromotionMove(request),
            PromotionAction::Finalize(request) => Mutation::FinalizePromotion(request),
        };
        vec![
            Effect::Emit(ControllerEvent::PromotionClosed),
            self.submit(mutation),
        ]
    }

    fn cancel_promotion(&mut self) -> Vec<Effect> {
        match self.promotion.cancel() {
            None => Vec::new(),
            Some(PendingPromotion::BeforeMove { .. }) => {
                vec![Effect::Emit(ControllerEvent::PromotionClosed)]
            }
            // The pawn already moved server-side; show what the service now has.
            Some(PendingPromotion::AfterMove { .. }) => {
                vec![Effect::Emit(ControllerEvent::PromotionClosed), self.fetch()]
            }
        }
    }

    fn on_snapshot(
        &mut self,
        seq: u64,
        result: Result<SnapshotResponse, ClientError>,
    ) -> Vec<Effect> {
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!(seq, error = %err, "snapshot fetch failed; keeping previous board");
                return Vec::new();
            }
        };
        if seq <= self.applied_seq {
            debug!(
                seq,
                applied_seq = self.applied_seq,
                "discarding stale snapshot"
            );
            return Vec::new();
        }

        self.applied_seq = seq;
        let applied = AppliedSnapshot {
            response,
            seq,
            received_at: Utc::now(),
        };
        let effect = self.render(&applied);
        self.snapshot = Some(applied);
        vec![effect]
    }

    fn render(&mut self, applied: &AppliedSnapshot) -> Effect {
        let view = render_board(
            &applied.response.chessboard,
            applied.response.current_player,
            self.flipped,
            &self.mapping,
        );
        if let DragState::Captured { piece, source } = self.drag.state() {
            if !view.is_draggable(source, piece) {
                debug!(%source, piece = %piece, "dropping capture no longer draggable");
                self.drag.cancel();
            }
        }
        self.view = Some(view.clone());
        Effect::Emit(ControllerEvent::Rendered {
            view,
            seq: applied.seq,
            received_at: applied.received_at,
        })
    }

    fn on_mutation(
        &mut self,
        seq: u64,
        mutation: Mutation,
        result: Result<MoveResult, ClientError>,
    ) -> Vec<Effect> {
        let operation = mutation.operation();
        match result {
            Err(err) => {
                warn!(seq, %operation, error = %err, "request failed");
                Vec::new()
            }
            Ok(MoveResult::Failure) => {
                info!(seq, %operation, "service rejected request");
                vec![Effect::Emit(ControllerEvent::Rejected { operation })]
            }
            Ok(MoveResult::Success) => {
                // Anything fetched before this mutation is now out of date.
                self.applied_seq = self.applied_seq.max(seq);
                match mutation {
                    Mutation::Move(request)
                        if self.promotion_mode == PromotionMode::FollowUp
                            && self
                                .mapping
                                .is_promotion_move(request.piece, request.target) =>
                    {
                        self.drag.cancel();
                        self.promotion.open(PendingPromotion::AfterMove {
                            target: request.target,
                            pawn: request.piece,
                        });
                        vec![Effect::Emit(ControllerEvent::PromotionOpened {
                            target: request.target,
                        })]
                    }
                    _ => vec![self.fetch()],
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
