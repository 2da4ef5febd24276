//! Static evaluation: material and piece placement, blended across the game
//! phase. Deliberately small; the search is the interesting part of this
//! engine and only needs stable, side-to-move-relative centipawn scores.

use super::Board;
use crate::types::{Color, Piece, PIECES};

/// Bonus for having the move.
const TEMPO: i32 = 10;

#[rustfmt::skip]
const PAWN_MG: [i32; 64] = [
      0,   0,   0,   0,   0,   0,   0,   0,
      5,  10,  10, -20, -20,  10,  10,   5,
      5,  -5, -10,   0,   0, -10,  -5,   5,
      0,   0,   0,  20,  20,   0,   0,   0,
      5,   5,  10,  25,  25,  10,   5,   5,
     10,  10,  20,  30,  30,  20,  10,  10,
     50,  50,  50,  50,  50,  50,  50,  50,
      0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const PAWN_EG: [i32; 64] = [
      0,   0,   0,   0,   0,   0,   0,   0,
     10,  10,  10,  10,  10,  10,  10,  10,
     10,  10,  10,  10,  10,  10,  10,  10,
     20,  20,  20,  20,  20,  20,  20,  20,
     30,  30,  30,  30,  30,  30,  30,  30,
     50,  50,  50,  50,  50,  50,  50,  50,
     80,  80,  80,  80,  80,  80,  80,  80,
      0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const KNIGHT_MG: [i32; 64] = [
    -50, -40, -30, -30, -30, -30, -40, -50,
    -40, -20,   0,   5,   5,   0, -20, -40,
    -30,   5,  10,  15,  15,  10,   5, -30,
    -30,   0,  15,  20,  20,  15,   0, -30,
    -30,   5,  15,  20,  20,  15,   5, -30,
    -30,   0,  10,  15,  15,  10,   0, -30,
    -40, -20,   0,   0,   0,   0, -20, -40,
    -50, -40, -30, -30, -30, -30, -40, -50,
];

#[rustfmt::skip]
const BISHOP_MG: [i32; 64] = [
    -20, -10, -10, -10, -10, -10, -10, -20,
    -10,   5,   0,   0,   0,   0,   5, -10,
    -10,  10,  10,  10,  10,  10,  10, -10,
    -10,   0,  10,  10,  10,  10,   0, -10,
    -10,   5,   5,  10,  10,   5,   5, -10,
    -10,   0,   5,  10,  10,   5,   0, -10,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -20, -10, -10, -10, -10, -10, -10, -20,
];

#[rustfmt::skip]
const ROOK_MG: [i32; 64] = [
      0,   0,   0,   5,   5,   0,   0,   0,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
      5,  10,  10,  10,  10,  10,  10,   5,
      0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const QUEEN_MG: [i32; 64] = [
    -20, -10, -10,  -5,  -5, -10, -10, -20,
    -10,   0,   5,   0,   0,   0,   0, -10,
    -10,   5,   5,   5,   5,   5,   0, -10,
      0,   0,   5,   5,   5,   5,   0,  -5,
     -5,   0,   5,   5,   5,   5,   0,  -5,
    -10,   0,   5,   5,   5,   5,   0, -10,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -20, -10, -10,  -5,  -5, -10, -10, -20,
];

#[rustfmt::skip]
const KING_MG: [i32; 64] = [
     20,  30,  10,   0,   0,  10,  30,  20,
     20,  20,   0,   0,   0,   0,  20,  20,
    -10, -20, -20, -20, -20, -20, -20, -10,
    -20, -30, -30, -40, -40, -30, -30, -20,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
];

#[rustfmt::skip]
const KING_EG: [i32; 64] = [
    -50, -30, -30, -30, -30, -30, -30, -50,
    -30, -30,   0,   0,   0,   0, -30, -30,
    -30, -10,  20,  30,  30,  20, -10, -30,
    -30, -10,  30,  40,  40,  30, -10, -30,
    -30, -10,  30,  40,  40,  30, -10, -30,
    -30, -10,  20,  30,  30,  20, -10, -30,
    -30, -20, -10,   0,   0, -10, -20, -30,
    -50, -40, -30, -20, -20, -30, -40, -50,
];

fn square_bonus(piece: Piece, index: usize, phase: f32) -> i32 {
    let (mg, eg) = match piece {
        Piece::Pawn => (PAWN_MG[index], PAWN_EG[index]),
        Piece::Knight => (KNIGHT_MG[index], KNIGHT_MG[index]),
        Piece::Bishop => (BISHOP_MG[index], BISHOP_MG[index]),
        Piece::Rook => (ROOK_MG[index], ROOK_MG[index]),
        Piece::Queen => (QUEEN_MG[index], QUEEN_MG[index]),
        Piece::King => (KING_MG[index], KING_EG[index]),
    };
    (mg as f32 * phase + eg as f32 * (1.0 - phase)) as i32
}

impl Board {
    /// Positive means the side to move is better.
    pub fn evaluate(&self) -> i32 {
        let phase = self.game_phase();
        let mut white_score = 0;

        for color in [Color::White, Color::Black] {
            let sign = if color.is_white() { 1 } else { -1 };
            for &piece in &PIECES {
                for square in self.pieces(color, piece) {
                    // tables are laid out from white's point of view
                    let index = if color.is_white() {
                        square.index()
                    } else {
                        square.index() ^ 56
                    };
                    white_score += sign * (piece.value() + square_bonus(piece, index, phase));
                }
            }
        }

        let relative = if self.current_player().is_white() {
            white_score
        } else {
            -white_score
        };
        relative + TEMPO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::STARTPOS_FEN;

    #[test]
    fn start_position_is_balanced() {
        let board = Board::from_fen(STARTPOS_FEN).unwrap();
        // symmetric position: only the tempo bonus remains
        assert_eq!(board.evaluate(), TEMPO);
    }

    #[test]
    fn evaluation_is_side_relative() {
        let white_up = Board::from_fen("4k3/8/8/8/8/8/8/QQQQK3 w - - 0 1").unwrap();
        assert!(white_up.evaluate() > 0);
        let black_view = Board::from_fen("4k3/8/8/8/8/8/8/QQQQK3 b - - 0 1").unwrap();
        assert!(black_view.evaluate() < 0);
    }

    #[test]
    fn extra_material_outweighs_placement() {
        let board = Board::from_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
        assert!(board.evaluate() > 50);
    }
}
