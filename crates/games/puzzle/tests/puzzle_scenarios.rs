use serde_json::Value;
use tile_core::input::{Button, ScriptedInput};
use tile_core::lcd::SharedLcd;
use tile_core::rng::Rng;
use tile_core::video::Plane;
use tile_core::{Kernel, Scheduler};
use tile_puzzle::board::{Board, GRID_WIDTH};
use tile_puzzle::pieces::{Piece, Shape};
use tile_puzzle::{Puzzle, BLOCK_TILE, EMPTY_TILE, GRID_OFFSET_X};

fn snapshot_u64(state: &Value, key: &str) -> u64 {
    state[key].as_u64().unwrap()
}

#[test]
fn vertical_i_clears_the_bottom_row() {
    let mut board = Board::new();
    for x in 0..GRID_WIDTH {
        board.set(x, 17, x != 4);
    }
    assert_eq!(board.count(), 9);

    // Left once (3 -> 2), release, rotate to vertical (column 2 of the box
    // lands on well column 4), then hold Down
    let mut trace = vec![Button::Left.mask(), 0x00, Button::A.mask()];
    trace.extend(std::iter::repeat(Button::Down.mask()).take(80));

    let lcd = SharedLcd::default();
    let kernel = Kernel::new()
        .with_seed(1)
        .with_video(Box::new(lcd.clone()))
        .with_input(Box::new(ScriptedInput::new(trace)));
    let puzzle = Puzzle::with_position(board, Piece::new(Shape::I, 3, 0), Shape::O);
    let mut s = Scheduler::new(Box::new(puzzle), kernel).unwrap();

    s.step().unwrap();
    assert_eq!(s.game().snapshot()["current"]["x"], 2);
    s.step().unwrap();
    s.step().unwrap();
    assert_eq!(s.game().snapshot()["current"]["rotation"], 1);

    let mut state = s.game().snapshot();
    while snapshot_u64(&state, "lines") == 0 {
        s.step().unwrap();
        state = s.game().snapshot();
    }

    assert_eq!(snapshot_u64(&state, "lines"), 1);
    assert_eq!(snapshot_u64(&state, "score"), 100);
    assert_eq!(state["state"], "LineClear");
    // 9 + 4 placed - 10 cleared
    assert_eq!(snapshot_u64(&state, "filled"), 3);

    // The three surviving cells of the I sit in column 4, rows 15..17
    let rows = &state["board"]["rows"];
    for y in 15..18 {
        assert_eq!(rows[y][4], 1, "row {}", y);
    }
    assert_eq!(rows[14][4], 0);

    // The full redraw lands during the next frame's render
    s.step().unwrap();
    let screen = lcd.lcd();
    assert_eq!(screen.map_cell(Plane::Background, GRID_OFFSET_X + 4, 17), BLOCK_TILE);
    assert_eq!(screen.map_cell(Plane::Background, GRID_OFFSET_X, 17), EMPTY_TILE);
}

/// Fill `rows` except well column 4, drop a vertical I down that column and
/// return the state at the lock.
fn drop_i_into_gap(rows: std::ops::Range<usize>) -> Value {
    let mut board = Board::new();
    for y in rows {
        for x in 0..GRID_WIDTH {
            board.set(x, y, x != 4);
        }
    }
    let mut trace = vec![Button::Left.mask(), 0x00, Button::A.mask()];
    trace.extend(std::iter::repeat(Button::Down.mask()).take(80));
    let kernel = Kernel::new()
        .with_seed(1)
        .with_input(Box::new(ScriptedInput::new(trace)));
    let puzzle = Puzzle::with_position(board, Piece::new(Shape::I, 3, 0), Shape::O);
    let mut s = Scheduler::new(Box::new(puzzle), kernel).unwrap();

    let mut state = s.game().snapshot();
    while snapshot_u64(&state, "locked") == 0 {
        s.step().unwrap();
        state = s.game().snapshot();
    }
    state
}

#[test]
fn double_clear_scores_300() {
    let state = drop_i_into_gap(16..18);
    assert_eq!(snapshot_u64(&state, "lines"), 2);
    assert_eq!(snapshot_u64(&state, "score"), 300);
    // 18 + 4 placed - 20 cleared
    assert_eq!(snapshot_u64(&state, "filled"), 2);
    let rows = &state["board"]["rows"];
    assert_eq!(rows[16][4], 1);
    assert_eq!(rows[17][4], 1);
    assert_eq!(rows[15][4], 0);
}

#[test]
fn four_line_clear_scores_800() {
    let state = drop_i_into_gap(14..18);
    assert_eq!(snapshot_u64(&state, "lines"), 4);
    assert_eq!(snapshot_u64(&state, "score"), 800);
    assert_eq!(snapshot_u64(&state, "filled"), 0);
}

fn random_trace(seed: u16, len: usize) -> Vec<u8> {
    let mut rng = Rng::new(seed);
    (0..len)
        .map(|_| {
            // Mostly Left/Right/Down/A/Start so pieces actually move and lock
            let mask = rng.next() as u8;
            mask & (Button::Left.mask()
                | Button::Right.mask()
                | Button::Down.mask()
                | Button::A.mask()
                | Button::Start.mask())
        })
        .collect()
}

fn run_trace(seed: u16, trace: &[u8]) -> Vec<Value> {
    let kernel = Kernel::new()
        .with_seed(seed)
        .with_input(Box::new(ScriptedInput::new(trace.to_vec())));
    let mut s = Scheduler::new(Box::new(Puzzle::new()), kernel).unwrap();
    let mut states = Vec::new();
    while !s.kernel().input_exhausted() {
        s.step().unwrap();
        states.push(s.snapshot());
    }
    states
}

#[test]
fn replay_reproduces_every_frame() {
    let trace = random_trace(0xBEEF, 1500);
    let first = run_trace(7, &trace);
    let second = run_trace(7, &trace);
    assert_eq!(first.len(), 1500);
    assert_eq!(first, second);
}

#[test]
fn different_seeds_diverge() {
    let trace = random_trace(0xBEEF, 300);
    let a = run_trace(1, &trace);
    let b = run_trace(2, &trace);
    assert_ne!(a.last().unwrap()["rng"], b.last().unwrap()["rng"]);
}

#[test]
fn filled_cells_track_locks_and_clears() {
    let trace = random_trace(0x1234, 3000);
    for state in run_trace(3, &trace) {
        let game = &state["state"];
        let filled = snapshot_u64(game, "filled");
        let locked = snapshot_u64(game, "locked");
        let lines = snapshot_u64(game, "lines");
        assert_eq!(filled + 10 * lines, 4 * locked);
    }
}
