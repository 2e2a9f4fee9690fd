use super::*;
use crate::{
    controller::Operation, render::BoardView, ClientError, MemoryOrientationStore,
};
use async_trait::async_trait;
use shared::{
    domain::{BoardSnapshot, Side},
    protocol::{
        HistoryEntry, MoveRequest, MoveResult, PromotionFinalizeRequest, SnapshotResponse,
    },
};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::{sync::Mutex, time::timeout};

fn at(row: usize, col: usize) -> Coord {
    Coord::new(row, col).expect("coord")
}

fn code(c: char) -> PieceCode {
    PieceCode::new(c).expect("piece code")
}

fn board(pieces: &[((usize, usize), char)], player: Side) -> SnapshotResponse {
    SnapshotResponse {
        chessboard: pieces
            .iter()
            .fold(BoardSnapshot::empty(), |b, ((row, col), c)| {
                b.with_piece(at(*row, *col), code(*c))
            }),
        current_player: player,
    }
}

/// In-process stand-in for the rule service: applies every move it accepts.
struct FakeBoardService {
    snapshot: Mutex<SnapshotResponse>,
    accept_moves: bool,
    fetches: AtomicUsize,
    moves: Mutex<Vec<MoveRequest>>,
    finalized: Mutex<Vec<PromotionFinalizeRequest>>,
}

impl FakeBoardService {
    fn new(snapshot: SnapshotResponse) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            accept_moves: true,
            fetches: AtomicUsize::new(0),
            moves: Mutex::new(Vec::new()),
            finalized: Mutex::new(Vec::new()),
        }
    }

    fn rejecting(snapshot: SnapshotResponse) -> Self {
        Self {
            accept_moves: false,
            ..Self::new(snapshot)
        }
    }
}

#[async_trait]
impl BoardService for FakeBoardService {
    async fn fetch_snapshot(&self) -> Result<SnapshotResponse, ClientError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot.lock().await.clone())
    }

    async fn submit_move(&self, request: &MoveRequest) -> Result<MoveResult, ClientError> {
        self.moves.lock().await.push(request.clone());
        if !self.accept_moves {
            return Ok(MoveResult::Failure);
        }
        let mut snapshot = self.snapshot.lock().await;
        let moved = std::mem::take(&mut snapshot.chessboard);
        let mut next = BoardSnapshot::empty();
        for (coord, piece) in moved.pieces() {
            if coord != request.source && coord != request.target {
                next = next.with_piece(coord, piece);
            }
        }
        snapshot.chessboard = next.with_piece(request.target, request.piece);
        snapshot.current_player = snapshot.current_player.opponent();
        Ok(MoveResult::Success)
    }

    async fn finalize_promotion(
        &self,
        request: &PromotionFinalizeRequest,
    ) -> Result<MoveResult, ClientError> {
        self.finalized.lock().await.push(request.clone());
        let mut snapshot = self.snapshot.lock().await;
        let current = std::mem::take(&mut snapshot.chessboard);
        snapshot.chessboard = current.with_piece(request.target, request.piece);
        Ok(MoveResult::Success)
    }

    async fn reset(&self) -> Result<MoveResult, ClientError> {
        *self.snapshot.lock().await = board(&[((6, 4), 'p'), ((1, 4), 'P')], Side::White);
        Ok(MoveResult::Success)
    }

    async fn undo(&self) -> Result<MoveResult, ClientError> {
        Ok(MoveResult::Failure)
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, ClientError> {
        let moves = self.moves.lock().await;
        Ok(moves
            .iter()
            .map(|request| HistoryEntry {
                player: Side::White,
                piece: request.piece,
                source: request.source,
                target: request.target,
                captured: None,
            })
            .collect())
    }
}

async fn next_event<F>(
    rx: &mut broadcast::Receiver<ControllerEvent>,
    mut wanted: F,
) -> ControllerEvent
where
    F: FnMut(&ControllerEvent) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event channel open");
            if wanted(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for controller event")
}

async fn next_render(rx: &mut broadcast::Receiver<ControllerEvent>) -> BoardView {
    match next_event(rx, |e| matches!(e, ControllerEvent::Rendered { .. })).await {
        ControllerEvent::Rendered { view, .. } => view,
        _ => unreachable!(),
    }
}

fn settings(promotion_mode: PromotionMode) -> ControllerSettings {
    ControllerSettings {
        promotion_mode,
        ..ControllerSettings::default()
    }
}

#[tokio::test]
async fn renders_immediately_on_start() {
    let service = Arc::new(FakeBoardService::new(board(&[((6, 4), 'P')], Side::White)));
    let controller = BoardController::new(
        service.clone(),
        Arc::new(MemoryOrientationStore::default()),
        ControllerSettings::default(),
    );
    let mut events = controller.subscribe();
    let handle = controller.start().await;

    let view = next_render(&mut events).await;
    assert!(!view.piece_at(at(6, 4)).expect("piece").draggable);
    assert!(service.fetches.load(Ordering::SeqCst) >= 1);

    handle.stop().await.expect("stop");
}

#[tokio::test]
async fn drag_and_drop_submits_move_and_refreshes() {
    let service = Arc::new(FakeBoardService::new(board(&[((6, 4), 'p')], Side::White)));
    let controller = BoardController::new(
        service.clone(),
        Arc::new(MemoryOrientationStore::default()),
        ControllerSettings::default(),
    );
    let mut events = controller.subscribe();
    let handle = controller.start().await;
    next_render(&mut events).await;

    handle.pickup(code('p'), at(6, 4)).await.expect("pickup");
    handle.drag_over(at(4, 4)).await.expect("drag over");
    handle
        .drop(DropTarget::Square(at(4, 4)))
        .await
        .expect("drop");

    let view = next_event(&mut events, |e| {
        matches!(e, ControllerEvent::Rendered { view, .. } if view.piece_at(at(4, 4)).is_some())
    })
    .await;
    let ControllerEvent::Rendered { view, .. } = view else {
        unreachable!()
    };
    assert!(view.piece_at(at(6, 4)).is_none());
    assert_eq!(view.current_player(), Side::Black);
    assert_eq!(
        service.moves.lock().await.as_slice(),
        &[MoveRequest::new(at(6, 4), at(4, 4), code('p'))]
    );

    handle.stop().await.expect("stop");
}

#[tokio::test]
async fn rejected_move_emits_notice() {
    let service = Arc::new(FakeBoardService::rejecting(board(
        &[((6, 4), 'p')],
        Side::White,
    )));
    let controller = BoardController::new(
        service.clone(),
        Arc::new(MemoryOrientationStore::default()),
        ControllerSettings::default(),
    );
    let mut events = controller.subscribe();
    let handle = controller.start().await;
    next_render(&mut events).await;

    handle.pickup(code('p'), at(6, 4)).await.expect("pickup");
    handle
        .drop(DropTarget::Piece { square: at(2, 4) })
        .await
        .expect("drop");

    let event = next_event(&mut events, |e| matches!(e, ControllerEvent::Rejected { .. })).await;
    assert_eq!(
        event,
        ControllerEvent::Rejected {
            operation: Operation::Move
        }
    );

    handle.stop().await.expect("stop");
}

#[tokio::test]
async fn follow_up_promotion_finalizes_chosen_role() {
    let service = Arc::new(FakeBoardService::new(board(&[((1, 3), 'p')], Side::White)));
    let controller = BoardController::new(
        service.clone(),
        Arc::new(MemoryOrientationStore::default()),
        settings(PromotionMode::FollowUp),
    );
    let mut events = controller.subscribe();
    let handle = controller.start().await;
    next_render(&mut events).await;

    handle.pickup(code('p'), at(1, 3)).await.expect("pickup");
    handle
        .drop(DropTarget::Square(at(0, 3)))
        .await
        .expect("drop");

    let opened = next_event(&mut events, |e| {
        matches!(e, ControllerEvent::PromotionOpened { .. })
    })
    .await;
    assert_eq!(opened, ControllerEvent::PromotionOpened { target: at(0, 3) });

    handle
        .choose_promotion(PromotionRole::Queen)
        .await
        .expect("choose");
    let view = next_event(&mut events, |e| {
        matches!(e, ControllerEvent::Rendered { view, .. }
            if view.piece_at(at(0, 3)).map(|p| p.code) == Some(code('q')))
    })
    .await;
    assert!(matches!(view, ControllerEvent::Rendered { .. }));
    assert_eq!(
        service.finalized.lock().await.as_slice(),
        &[PromotionFinalizeRequest {
            target: at(0, 3),
            piece: code('q'),
        }]
    );

    handle.stop().await.expect("stop");
}

#[tokio::test]
async fn orientation_is_loaded_and_persisted() {
    let store = Arc::new(MemoryOrientationStore::new(true));
    let service = Arc::new(FakeBoardService::new(board(&[((6, 4), 'p')], Side::White)));
    let controller = BoardController::new(service, store.clone(), ControllerSettings::default());
    let mut events = controller.subscribe();
    let handle = controller.start().await;

    let view = next_render(&mut events).await;
    assert!(view.is_flipped());

    handle.toggle_orientation().await.expect("toggle");
    let changed = next_event(&mut events, |e| {
        matches!(e, ControllerEvent::OrientationChanged { .. })
    })
    .await;
    assert_eq!(changed, ControllerEvent::OrientationChanged { flipped: false });
    let view = next_render(&mut events).await;
    assert!(!view.is_flipped());

    handle.stop().await.expect("stop");
    assert!(!store.load().await.expect("load"));
}

#[tokio::test]
async fn reset_refreshes_and_history_is_delivered() {
    let service = Arc::new(FakeBoardService::new(board(&[((3, 3), 'q')], Side::Black)));
    let controller = BoardController::new(
        service,
        Arc::new(MemoryOrientationStore::default()),
        ControllerSettings::default(),
    );
    let mut events = controller.subscribe();
    let handle = controller.start().await;
    next_render(&mut events).await;

    handle.reset().await.expect("reset");
    let reset = next_event(&mut events, |e| {
        matches!(e, ControllerEvent::Rendered { view, .. } if view.piece_at(at(3, 3)).is_none())
    })
    .await;
    let ControllerEvent::Rendered { view, .. } = reset else {
        unreachable!()
    };
    assert!(view.piece_at(at(6, 4)).is_some());
    assert!(view.piece_at(at(1, 4)).is_some());

    handle.fetch_history().await.expect("history");
    let history = next_event(&mut events, |e| matches!(e, ControllerEvent::History(_))).await;
    assert_eq!(history, ControllerEvent::History(Vec::new()));

    handle.undo().await.expect("undo");
    let rejected = next_event(&mut events, |e| matches!(e, ControllerEvent::Rejected { .. })).await;
    assert_eq!(
        rejected,
        ControllerEvent::Rejected {
            operation: Operation::Undo
        }
    );

    handle.stop().await.expect("stop");
}

#[tokio::test(start_paused = true)]
async fn polls_on_fixed_interval() {
    let service = Arc::new(FakeBoardService::new(board(&[((6, 4), 'p')], Side::White)));
    let controller = BoardController::new(
        service.clone(),
        Arc::new(MemoryOrientationStore::default()),
        ControllerSettings::default(),
    );
    let mut events = controller.subscribe();
    let started = tokio::time::Instant::now();
    let handle = controller.start().await;

    let mut seqs = Vec::new();
    for _ in 0..3 {
        if let ControllerEvent::Rendered { seq, .. } =
            next_event(&mut events, |e| matches!(e, ControllerEvent::Rendered { .. })).await
        {
            seqs.push(seq);
        }
    }
    assert!(seqs.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(started.elapsed() >= Duration::from_secs(4));
    assert_eq!(service.fetches.load(Ordering::SeqCst), 3);

    handle.stop().await.expect("stop");
}
