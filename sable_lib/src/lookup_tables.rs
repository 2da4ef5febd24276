use sable_bitboards::{BitBoard, Square};
use sable_pregen::*;

#[inline(always)]
pub fn lookup_knight(square: Square) -> BitBoard {
    #[cfg(debug_assertions)]
    {
        KNIGHT_TABLE[square.index()]
    }
    #[cfg(not(debug_assertions))]
    unsafe {
        *KNIGHT_TABLE.get_unchecked(square.index())
    }
}

#[inline(always)]
pub fn lookup_king(square: Square) -> BitBoard {
    #[cfg(debug_assertions)]
    {
        KING_TABLE[square.index()]
    }
    #[cfg(not(debug_assertions))]
    unsafe {
        *KING_TABLE.get_unchecked(square.index())
    }
}

#[inline(always)]
pub fn lookup_bishop(square: Square, occupied: BitBoard) -> BitBoard {
    #[cfg(debug_assertions)]
    {
        SLIDING_ATTACK_TABLE[bishop_attack_index(square, occupied)]
    }
    #[cfg(not(debug_assertions))]
    unsafe {
        *SLIDING_ATTACK_TABLE.get_unchecked(bishop_attack_index(square, occupied))
    }
}

#[inline(always)]
pub fn lookup_rook(square: Square, occupied: BitBoard) -> BitBoard {
    #[cfg(debug_assertions)]
    {
        SLIDING_ATTACK_TABLE[rook_attack_index(square, occupied)]
    }
    #[cfg(not(debug_assertions))]
    unsafe {
        *SLIDING_ATTACK_TABLE.get_unchecked(rook_attack_index(square, occupied))
    }
}

#[inline(always)]
pub fn lookup_queen(square: Square, occupied: BitBoard) -> BitBoard {
    lookup_rook(square, occupied) | lookup_bishop(square, occupied)
}

#[inline(always)]
pub fn lookup_between(a: Square, b: Square) -> BitBoard {
    #[cfg(debug_assertions)]
    {
        BETWEEN[a.index()][b.index()]
    }
    #[cfg(not(debug_assertions))]
    unsafe {
        *BETWEEN
            .get_unchecked(a.index())
            .get_unchecked(b.index())
    }
}
