//! Tic-tac-toe implementation of the `engine-core` Game trait.
//!
//! The classic 3x3 game. Small enough that forced wins and losses sit a few
//! plies deep, which makes it the reference game for exercising proof-aware
//! search: a fork position is provable within a few dozen iterations.
//!
//! # Usage
//!
//! ```rust
//! use engine_core::{Agent, Game};
//! use games_tictactoe::{Move, Position, TicTacToe};
//!
//! let game = TicTacToe::new();
//! let position = Position::new();
//!
//! assert_eq!(game.mover(&position), Agent(0));
//! assert_eq!(game.legal_moves(&position).len(), 9);
//!
//! let next = game.apply(&position, &Move(4)).unwrap();
//! assert_eq!(game.mover(&next), Agent(1));
//! ```

use engine_core::{Agent, Game, GameError};

/// Winning positions (rows, columns, diagonals).
const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8], // rows
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8], // columns
    [0, 4, 8],
    [2, 4, 6], // diagonals
];

const fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Zobrist keys: one per (square, piece), plus a side-to-move key.
const fn zobrist_keys() -> [[u64; 2]; 9] {
    let mut keys = [[0u64; 2]; 9];
    let mut square = 0;
    while square < 9 {
        keys[square][0] = splitmix64(0x7C7A_11ED ^ (square as u64));
        keys[square][1] = splitmix64(0x51DE_B00C ^ (square as u64));
        square += 1;
    }
    keys
}

const ZOBRIST: [[u64; 2]; 9] = zobrist_keys();
const ZOBRIST_SIDE: u64 = splitmix64(0xBADC_0FFE_E0DD_F00D);

/// Tic-tac-toe position.
///
/// Board squares are numbered 0-8, row-major from the top-left. Cells hold
/// 0 = empty, 1 = first player's piece, 2 = second player's piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    board: [u8; 9],
    /// Agent to move: 0 or 1.
    to_move: u8,
    /// 0 = ongoing, 1 = first player won, 2 = second player won, 3 = draw.
    winner: u8,
}

impl Position {
    /// Empty board, first player to move.
    pub fn new() -> Self {
        Self {
            board: [0; 9],
            to_move: 0,
            winner: 0,
        }
    }

    /// Build a position mid-game. `cells` holds 0/1/2 per square; `to_move`
    /// is the agent index. The winner field is derived from the board.
    pub fn from_cells(cells: [u8; 9], to_move: u8) -> Self {
        Self {
            board: cells,
            to_move,
            winner: Self::check_winner(&cells),
        }
    }

    /// Whether the game is over.
    pub fn is_done(&self) -> bool {
        self.winner != 0
    }

    /// Squares still open, in ascending order.
    pub fn open_squares(&self) -> Vec<u8> {
        if self.is_done() {
            return Vec::new();
        }
        (0..9u8).filter(|&sq| self.board[sq as usize] == 0).collect()
    }

    /// Check for a winner on the board: 0 ongoing, 1/2 winner, 3 draw.
    fn check_winner(board: &[u8; 9]) -> u8 {
        for line in &LINES {
            let [a, b, c] = *line;
            if board[a] != 0 && board[a] == board[b] && board[b] == board[c] {
                return board[a];
            }
        }
        if board.iter().all(|&cell| cell != 0) {
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

/// Place a piece on the given square (0-8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move(pub u8);

impl Move {
    /// The target square.
    pub fn square(&self) -> u8 {
        self.0
    }
}

/// Tic-tac-toe rules object.
#[derive(Debug, Default)]
pub struct TicTacToe;

impl TicTacToe {
    pub fn new() -> Self {
        Self
    }

    /// Static evaluation in [-1, 1] from `agent`'s perspective.
    ///
    /// Counts open lines weighted by how far along they are: a line with two
    /// own pieces and an empty square counts 0.2, one own piece and two empty
    /// 0.05. Decided positions score the exact outcome.
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
        let mut score: f64 = 0.0;
        for line in &LINES {
            let mut mine = 0;
            let mut theirs = 0;
            for &sq in line {
                match position.board[sq] {
                    0 => {}
                    p if p == own => mine += 1,
                    _ => theirs += 1,
                }
            }
            score += match (mine, theirs) {
                (2, 0) => 0.2,
                (1, 0) => 0.05,
                (0, 2) => -0.2,
                (0, 1) => -0.05,
                _ => 0.0, // blocked line
            };
        }
        score.clamp(-0.95, 0.95)
    }
}

impl Game for TicTacToe {
    type Position = Position;
    type Move = Move;

    fn id(&self) -> &str {
        "tictactoe"
    }

    fn num_agents(&self) -> usize {
        2
    }

    fn mover(&self, position: &Position) -> Agent {
        Agent(position.to_move)
    }

    fn legal_moves(&self, position: &Position) -> Vec<Move> {
        position.open_squares().into_iter().map(Move).collect()
    }

    fn apply(&self, position: &Position, mv: &Move) -> Result<Position, GameError> {
        let sq = mv.square() as usize;
        if position.is_done() {
            return Err(GameError::IllegalMove("game is over".into()));
        }
        if sq >= 9 || position.board[sq] != 0 {
            return Err(GameError::IllegalMove(format!("square {} unavailable", sq)));
        }

        let mut next = *position;
        next.board[sq] = position.to_move + 1;
        next.winner = Position::check_winner(&next.board);
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
        for (sq, &cell) in position.board.iter().enumerate() {
            if cell != 0 {
                h ^= ZOBRIST[sq][(cell - 1) as usize];
            }
        }
        if position.to_move == 1 {
            h ^= ZOBRIST_SIDE;
        }
        h
    }
}
