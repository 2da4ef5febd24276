use std::fmt::Write as _;
use std::{fs, path::Path};

use rand::prelude::*;
use sable_bitboards::BitBoard;

const ZOBRIST_COUNT: usize = 64 * 6 * 2 + 1 + 16 + 8;
const SLIDING_TABLE_SIZE: usize = 107_648;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    fs::write(
        Path::new("src/zobrist.rs"),
        format!(
            "pub static ZOBRIST_NUMBERS: [u64; {ZOBRIST_COUNT}] = {:?};\n",
            zobrist_numbers()
        ),
    )
    .unwrap();

    fs::write(Path::new("src/lookup_tables.rs"), lookup_tables_source()).unwrap();
}

fn zobrist_numbers() -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(0x5AB1E_C0DE_B00);
    let mut numbers = vec![0u64; ZOBRIST_COUNT];
    rng.fill(&mut numbers[..]);
    numbers
}

fn lookup_tables_source() -> String {
    let mut attack_table = vec![BitBoard::empty(); SLIDING_TABLE_SIZE];
    let mut next_index = 0;
    let mut rng = StdRng::seed_from_u64(0x5AB1E_5EED);

    let mut rook_magics = [MagicSquare::default(); 64];
    for square in 0..64 {
        rook_magics[square] = find_magic(square, false, &mut attack_table, &mut next_index, &mut rng);
    }
    let mut bishop_magics = [MagicSquare::default(); 64];
    for square in 0..64 {
        bishop_magics[square] =
            find_magic(square, true, &mut attack_table, &mut next_index, &mut rng);
    }

    let mut out = String::new();
    out.push_str("use sable_bitboards::{BitBoard, Square};\n\n");
    out.push_str("#[derive(Copy, Clone, Debug)]\n");
    out.push_str("pub struct MagicSquare {\n");
    out.push_str("    pub index: usize,\n");
    out.push_str("    pub mask: BitBoard,\n");
    out.push_str("    pub magic: u64,\n");
    out.push_str("    pub shift: u8,\n");
    out.push_str("}\n\n");
    out.push_str("#[inline(always)]\n");
    out.push_str("pub fn rook_attack_index(square: Square, occupied: BitBoard) -> usize {\n");
    out.push_str("    let m = &ROOK_MAGICS[square as usize];\n");
    out.push_str(
        "    m.index + (((occupied.as_u64() & m.mask.as_u64()).wrapping_mul(m.magic)) >> (64 - m.shift)) as usize\n",
    );
    out.push_str("}\n\n");
    out.push_str("#[inline(always)]\n");
    out.push_str("pub fn bishop_attack_index(square: Square, occupied: BitBoard) -> usize {\n");
    out.push_str("    let m = &BISHOP_MAGICS[square as usize];\n");
    out.push_str(
        "    m.index + (((occupied.as_u64() & m.mask.as_u64()).wrapping_mul(m.magic)) >> (64 - m.shift)) as usize\n",
    );
    out.push_str("}\n\n");

    writeln!(
        out,
        "pub static KNIGHT_TABLE: [BitBoard; 64] = {:?};\n",
        knight_table()
    )
    .unwrap();
    writeln!(
        out,
        "pub static KING_TABLE: [BitBoard; 64] = {:?};\n",
        king_table()
    )
    .unwrap();
    writeln!(
        out,
        "pub static BETWEEN: [[BitBoard; 64]; 64] = {:?};\n",
        between_table()
    )
    .unwrap();
    writeln!(
        out,
        "pub static ROOK_MAGICS: [MagicSquare; 64] = {:?};\n",
        rook_magics
    )
    .unwrap();
    writeln!(
        out,
        "pub static BISHOP_MAGICS: [MagicSquare; 64] = {:?};\n",
        bishop_magics
    )
    .unwrap();
    writeln!(
        out,
        "pub static SLIDING_ATTACK_TABLE: [BitBoard; {SLIDING_TABLE_SIZE}] = {:?};",
        attack_table
    )
    .unwrap();

    out
}

#[derive(Copy, Clone, Default, Debug)]
struct MagicSquare {
    index: usize,
    mask: BitBoard,
    magic: u64,
    shift: u8,
}

/// Finds a collision-free magic multiplier for one square and fills its
/// section of the shared attack table. Known-good constants are tried first;
/// a seeded sparse random search covers any square they fail on.
fn find_magic(
    square: usize,
    bishop: bool,
    attack_table: &mut [BitBoard],
    next_index: &mut usize,
    rng: &mut StdRng,
) -> MagicSquare {
    let mask = if bishop {
        bishop_mask(square)
    } else {
        rook_mask(square)
    };
    let bits = mask.count_ones() as u8;
    let subsets = 1usize << bits;

    let mut blocking_masks = Vec::with_capacity(subsets);
    let mut attack_masks = Vec::with_capacity(subsets);
    for i in 0..subsets {
        blocking_masks.push(subset_to_blocking_mask(i, bits, mask));
        attack_masks.push(if bishop {
            bishop_attacks(square, blocking_masks[i])
        } else {
            rook_attacks(square, blocking_masks[i])
        });
    }

    let pregen = if bishop {
        BISHOP_MAGICS[square]
    } else {
        ROOK_MAGICS[square]
    };

    let mut used = vec![BitBoard::empty(); subsets];
    for attempt in 0..100_000_000u64 {
        let magic = if attempt == 0 {
            pregen
        } else {
            // sparse multipliers are far more likely to hash without collisions
            rng.gen::<u64>() & rng.gen::<u64>() & rng.gen::<u64>()
        };

        for slot in used.iter_mut() {
            *slot = BitBoard::empty();
        }
        let mut failed = false;
        for i in 0..subsets {
            let hash =
                ((blocking_masks[i].as_u64().wrapping_mul(magic)) >> (64 - bits)) as usize;
            if used[hash] == BitBoard::empty() {
                used[hash] = attack_masks[i];
            } else if used[hash] != attack_masks[i] {
                failed = true;
                break;
            }
        }
        if !failed {
            attack_table[*next_index..(*next_index + subsets)].copy_from_slice(&used);
            let result = MagicSquare {
                index: *next_index,
                mask,
                magic,
                shift: bits,
            };
            *next_index += subsets;
            return result;
        }
    }

    panic!("failed to find a magic number for square index {square}");
}

fn subset_to_blocking_mask(subset: usize, bits: u8, mut mask: BitBoard) -> BitBoard {
    let mut result = BitBoard::empty();
    for i in 0..bits {
        let bit = mask.lsb_index();
        mask.clear_first_square();
        if subset & (1 << i) != 0 {
            result |= BitBoard(1 << bit);
        }
    }
    result
}

fn knight_table() -> Vec<BitBoard> {
    let mut table = vec![BitBoard::empty(); 64];
    for (square, entry) in table.iter_mut().enumerate() {
        let knight = BitBoard(1 << square);
        *entry = ((knight << 6) & NOT_G_H_FILES)
            | ((knight << 10) & NOT_A_B_FILES)
            | ((knight << 15) & NOT_H_FILE)
            | ((knight << 17) & NOT_A_FILE)
            | ((knight >> 6) & NOT_A_B_FILES)
            | ((knight >> 10) & NOT_G_H_FILES)
            | ((knight >> 15) & NOT_A_FILE)
            | ((knight >> 17) & NOT_H_FILE);
    }
    table
}

fn king_table() -> Vec<BitBoard> {
    let mut table = vec![BitBoard::empty(); 64];
    for (square, entry) in table.iter_mut().enumerate() {
        let mut king = BitBoard(1 << square);
        let mut moves = ((king << 1) & NOT_A_FILE) | ((king >> 1) & NOT_H_FILE);
        king |= moves;
        moves |= (king << 8) | (king >> 8);
        *entry = moves;
    }
    table
}

// is t strictly between a and b?
fn strictly_between(a: i8, t: i8, b: i8) -> bool {
    if a < b {
        a < t && t < b
    } else {
        b < t && t < a
    }
}

fn between_table() -> Vec<Vec<BitBoard>> {
    let mut result = vec![vec![BitBoard::empty(); 64]; 64];
    for start in 0i8..64 {
        for target in 0i8..64 {
            let (sr, sf) = (start / 8, start % 8);
            let (tr, tf) = (target / 8, target % 8);
            if start == target {
                continue;
            }
            let diagonal = tr.abs_diff(sr) == tf.abs_diff(sf);
            let orthogonal = tr == sr || tf == sf;
            if !diagonal && !orthogonal {
                continue;
            }
            for square in 0i8..64 {
                let (r, f) = (square / 8, square % 8);
                let on_line = if diagonal {
                    r.abs_diff(sr) == f.abs_diff(sf)
                        && r.abs_diff(tr) == f.abs_diff(tf)
                        && strictly_between(sr, r, tr)
                } else {
                    (r == sr && r == tr && strictly_between(sf, f, tf))
                        || (f == sf && f == tf && strictly_between(sr, r, tr))
                };
                if on_line {
                    result[start as usize][target as usize] |= BitBoard(1 << square);
                }
            }
        }
    }
    result
}

const NOT_A_FILE: BitBoard = BitBoard(!0x0101010101010101);
const NOT_A_B_FILES: BitBoard = BitBoard(!0x0303030303030303);
const NOT_H_FILE: BitBoard = BitBoard(!0x8080808080808080);
const NOT_G_H_FILES: BitBoard = BitBoard(!0xC0C0C0C0C0C0C0C0);

fn rook_mask(square: usize) -> BitBoard {
    let rank = (square / 8) as isize;
    let file = (square % 8) as isize;
    let mut result = BitBoard::empty();
    for r in (rank + 1)..7 {
        result |= BitBoard(1 << (file + r * 8));
    }
    for r in 1..rank {
        result |= BitBoard(1 << (file + r * 8));
    }
    for f in (file + 1)..7 {
        result |= BitBoard(1 << (f + rank * 8));
    }
    for f in 1..file {
        result |= BitBoard(1 << (f + rank * 8));
    }
    result
}

fn bishop_mask(square: usize) -> BitBoard {
    let rank = (square / 8) as isize;
    let file = (square % 8) as isize;
    let mut result = BitBoard::empty();
    for (df, dr) in [(1, 1), (-1, 1), (-1, -1), (1, -1)] {
        let mut f = file + df;
        let mut r = rank + dr;
        while (1..7).contains(&f) && (1..7).contains(&r) {
            result |= BitBoard(1 << (f + r * 8));
            f += df;
            r += dr;
        }
    }
    result
}

fn rook_attacks(square: usize, blockers: BitBoard) -> BitBoard {
    ray_attacks(square, blockers, &[(1, 0), (-1, 0), (0, 1), (0, -1)])
}

fn bishop_attacks(square: usize, blockers: BitBoard) -> BitBoard {
    ray_attacks(square, blockers, &[(1, 1), (-1, 1), (-1, -1), (1, -1)])
}

fn ray_attacks(square: usize, blockers: BitBoard, directions: &[(isize, isize)]) -> BitBoard {
    let rank = (square / 8) as isize;
    let file = (square % 8) as isize;
    let mut result = BitBoard::empty();
    for &(df, dr) in directions {
        let mut f = file + df;
        let mut r = rank + dr;
        while (0..8).contains(&f) && (0..8).contains(&r) {
            let mask = BitBoard(1 << (f + r * 8));
            result |= mask;
            if (blockers & mask).is_not_empty() {
                break;
            }
            f += df;
            r += dr;
        }
    }
    result
}

// Known-good fancy magics, revalidated above on every build.
const ROOK_MAGICS: [u64; 64] = [
    0xB480081120804000,
    0x21001020C0010080,
    0x8480100020000880,
    0x8100041000890060,
    0x048004008008004A,
    0x1500022100940008,
    0x0900242082003100,
    0x0080018000442B00,
    0x4048800040006080,
    0x0001004005008021,
    0x8580802000100480,
    0x0010803000800800,
    0x4120808004008800,
    0x4100800400020080,
    0x0019000700048200,
    0x0009000084620100,
    0x2800208000C00088,
    0x5040008041600080,
    0x4001010010200040,
    0x010452002200C008,
    0x8000808008020400,
    0x0044004002010040,
    0x3010540010260108,
    0x08010A000100906C,
    0x21C2400080002095,
    0x2100810200412201,
    0x0460450100200032,
    0x8000180080500080,
    0x2480080080140080,
    0x0088040080800200,
    0x0001081400019002,
    0x0021009200094104,
    0x3080C00188800122,
    0x404100C001002080,
    0x0000200080801004,
    0x01020230420008A0,
    0x0800140080800800,
    0x0004000200800480,
    0x0040880B84000210,
    0x2024054082001401,
    0x2014A84000808000,
    0x0041006200820044,
    0x0001004020090014,
    0x100008D001030020,
    0x0413080111010004,
    0x068200900C320048,
    0x9043008200430004,
    0x000020A104420004,
    0x4100800040002080,
    0x80070128C0008100,
    0x5044802000100480,
    0x0000900080080080,
    0x0000800400080080,
    0x0002008026040080,
    0x1100420148102400,
    0x00100C0091004600,
    0x0002204980010015,
    0x02A1004000802019,
    0x0006201008408202,
    0x4460201200964046,
    0x21020008A004B0A2,
    0x0002005038150402,
    0x0880221021408804,
    0x0000004411208502,
];

const BISHOP_MAGICS: [u64; 64] = [
    0x2008060828070110,
    0x0008500082004201,
    0x00040122020000C0,
    0x2004410220001008,
    0x0824042000101060,
    0x001A0124A0000000,
    0x2321042202402008,
    0x1400A3080804022A,
    0x0804050802180200,
    0x000A111012890840,
    0x1000460806088008,
    0x0002020A02021400,
    0x0001420210081000,
    0x00000208120A1300,
    0x0008141A88080801,
    0x2008851188040285,
    0x4C10002002220860,
    0x082002908D021098,
    0x0012000408020488,
    0x0000902802004100,
    0x0444000080A00040,
    0x4000802410148800,
    0xA012100D48242418,
    0x3180221184042600,
    0x0008040008105041,
    0x00108A20300A0609,
    0xC004100281010022,
    0xA062006182008200,
    0x1A05010108104000,
    0x201A008002482000,
    0x0882440422440200,
    0x0085002001008810,
    0x0901105200400402,
    0x0500880400081000,
    0x2214042810140040,
    0x1280208120080200,
    0x0040C0C0400C0100,
    0x000500D602050100,
    0x4104810040020821,
    0x02220A044009A401,
    0xA014020210C04000,
    0x0014110808004220,
    0x20A20100A8000480,
    0x0000004204805808,
    0x0430880905001010,
    0x0006009001040A80,
    0x08A0040100488A00,
    0x50100C0490842462,
    0x0001880508200080,
    0x21220A1301180040,
    0x4210060044120004,
    0x0210000022880440,
    0x0004440810340041,
    0x0002041004084006,
    0x0040900942008000,
    0x802002261A08A028,
    0x1000402208200412,
    0x0003020644044404,
    0x0420C00201039803,
    0x0E10000020C20205,
    0x0418400040086600,
    0x030001400C888082,
    0x3C0040480802808A,
    0x0004040810510208,
];
