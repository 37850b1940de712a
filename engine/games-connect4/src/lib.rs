//! Connect 4 implementation of the `engine-core` Game trait.
//!
//! Players drop discs into a 7-column, 6-row grid; first to line up four wins.
//! The board is stored in row-major order with row 0 at the bottom:
//!
//! ```text
//! Row 5: [35][36][37][38][39][40][41]  <- Top
//! Row 4: [28][29][30][31][32][33][34]
//! Row 3: [21][22][23][24][25][26][27]
//! Row 2: [14][15][16][17][18][19][20]
//! Row 1: [ 7][ 8][ 9][10][11][12][13]
//! Row 0: [ 0][ 1][ 2][ 3][ 4][ 5][ 6]  <- Bottom
//!         Col 0  1  2  3  4  5  6
//! ```
//!
//! Beyond the rules, the crate ships the classic positional evaluation
//! (each cell weighted by the number of four-in-a-row windows through it),
//! which gives the search's implicit-minimax path a meaningful heuristic.

use engine_core::{Agent, Game, GameError};

/// Board dimensions.
pub const COLS: usize = 7;
pub const ROWS: usize = 6;
pub const BOARD_SIZE: usize = COLS * ROWS; // 42

/// Number of four-in-a-row windows through each cell, bottom row first.
/// The center column dominates, which is what makes the heuristic useful.
const CELL_WEIGHTS: [i32; BOARD_SIZE] = [
    3, 4, 5, 7, 5, 4, 3, //
    4, 6, 8, 10, 8, 6, 4, //
    5, 8, 11, 13, 11, 8, 5, //
    5, 8, 11, 13, 11, 8, 5, //
    4, 6, 8, 10, 8, 6, 4, //
    3, 4, 5, 7, 5, 4, 3,
];

const fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

const fn zobrist_keys() -> [[u64; 2]; BOARD_SIZE] {
    let mut keys = [[0u64; 2]; BOARD_SIZE];
    let mut cell = 0;
    while cell < BOARD_SIZE {
        keys[cell][0] = splitmix64(0xC4_0000_0001 ^ (cell as u64));
        keys[cell][1] = splitmix64(0xC4_0000_0002 ^ ((cell as u64) << 8));
        cell += 1;
    }
    keys
}

const ZOBRIST: [[u64; 2]; BOARD_SIZE] = zobrist_keys();
const ZOBRIST_SIDE: u64 = splitmix64(0xC4_5EED_5EED);

/// Connect 4 position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// 0 = empty, 1 = first player's disc, 2 = second player's disc.
    board: [u8; BOARD_SIZE],
    /// Agent to move: 0 or 1.
    to_move: u8,
    /// 0 = ongoing, 1 = first player won, 2 = second player won, 3 = draw.
    winner: u8,
    /// Discs already in each column.
    column_heights: [u8; COLS],
}

impl Position {
    /// Empty board, first player to move.
    pub fn new() -> Self {
        Self {
            board: [0; BOARD_SIZE],
            to_move: 0,
            winner: 0,
            column_heights: [0; COLS],
        }
    }

    /// Whether the game is over.
    pub fn is_done(&self) -> bool {
        self.winner != 0
    }

    /// Columns that can still take a disc, in ascending order.
    pub fn open_columns(&self) -> Vec<u8> {
        if self.is_done() {
            return Vec::new();
        }
        (0..COLS as u8)
            .filter(|&col| self.column_heights[col as usize] < ROWS as u8)
            .collect()
    }

    /// Cell contents at (col, row); row 0 is the bottom.
    pub fn cell(&self, col: usize, row: usize) -> u8 {
        self.board[Self::pos(col, row)]
    }

    #[inline]
    fn pos(col: usize, row: usize) -> usize {
        row * COLS + col
    }

    /// Check if the disc at (col, row) completes a line of four.
    fn check_winner_at(&self, col: usize, row: usize) -> u8 {
        let player = self.board[Self::pos(col, row)];
        if player == 0 {
            return 0;
        }

        // Direction vectors: horizontal, vertical, diagonal /, diagonal \
        let directions: [(i32, i32); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

        for (dc, dr) in directions {
            let mut count = 1;

            let (mut c, mut r) = (col as i32 + dc, row as i32 + dr);
            while (0..COLS as i32).contains(&c)
                && (0..ROWS as i32).contains(&r)
                && self.board[Self::pos(c as usize, r as usize)] == player
            {
                count += 1;
                c += dc;
                r += dr;
            }

            let (mut c, mut r) = (col as i32 - dc, row as i32 - dr);
            while (0..COLS as i32).contains(&c)
                && (0..ROWS as i32).contains(&r)
                && self.board[Self::pos(c as usize, r as usize)] == player
            {
                count += 1;
                c -= dc;
                r -= dr;
            }

            if count >= 4 {
                return player;
            }
        }

        if self.column_heights.iter().all(|&h| h >= ROWS as u8) {
            return 3;
        }
        0
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop a disc into the given column (0-6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move(pub u8);

impl Move {
    /// The target column.
    pub fn column(&self) -> u8 {
        self.0
    }
}

/// Connect 4 rules object.
#[derive(Debug, Default)]
pub struct Connect4;

impl Connect4 {
    pub fn new() -> Self {
        Self
    }

    /// Static evaluation in [-1, 1] from `agent`'s perspective.
    ///
    /// Sums `CELL_WEIGHTS` over own discs minus the opponent's, scaled into
    /// the heuristic range. Decided positions score the exact outcome.
    pub fn heuristic(position: &Position, agent: Agent) -> f64 {
        match position.winner {
            1 | 2 => {
                return if position.winner == agent.0 + 1 {
                    1.0
                } else {
                    -1.0
                }
            }
            3 => return 0.0,
            _ => {}
        }

        let own = agent.0 + 1;
        let mut diff = 0i32;
        for (cell, &piece) in position.board.iter().enumerate() {
            if piece == own {
                diff += CELL_WEIGHTS[cell];
            } else if piece != 0 {
                diff -= CELL_WEIGHTS[cell];
            }
        }
        (f64::from(diff) / 69.0).clamp(-0.95, 0.95)
    }
}

impl Game for Connect4 {
    type Position = Position;
    type Move = Move;

    fn id(&self) -> &str {
        "connect4"
    }

    fn num_agents(&self) -> usize {
        2
    }

    fn mover(&self, position: &Position) -> Agent {
        Agent(position.to_move)
    }

    fn legal_moves(&self, position: &Position) -> Vec<Move> {
        position.open_columns().into_iter().map(Move).collect()
    }

    fn apply(&self, position: &Position, mv: &Move) -> Result<Position, GameError> {
        let col = mv.column() as usize;
        if position.is_done() {
            return Err(GameError::IllegalMove("game is over".into()));
        }
        if col >= COLS || position.column_heights[col] >= ROWS as u8 {
            return Err(GameError::IllegalMove(format!("column {} unavailable", col)));
        }

        let mut next = position.clone();
        let row = position.column_heights[col] as usize;
        next.board[Position::pos(col, row)] = position.to_move + 1;
        next.column_heights[col] += 1;
        next.winner = next.check_winner_at(col, row);
        if next.winner == 0 {
            next.to_move = 1 - position.to_move;
        }
        Ok(next)
    }

    fn is_terminal(&self, position: &Position) -> bool {
        position.is_done()
    }

    fn utilities(&self, position: &Position) -> Vec<f64> {
        match position.winner {
            1 => vec![1.0, -1.0],
            2 => vec![-1.0, 1.0],
            _ => vec![0.0, 0.0],
        }
    }

    fn position_hash(&self, position: &Position) -> u64 {
        let mut h = 0u64;
        for (cell, &piece) in position.board.iter().enumerate() {
            if piece != 0 {
                h ^= ZOBRIST[cell][(piece - 1) as usize];
            }
        }
        if position.to_move == 1 {
            h ^= ZOBRIST_SIDE;
        }
        h
    }
}
