//! Morton (Z-order) codes for octree cells
//!
//! Bit 0 of every triple is x, bit 1 is y, bit 2 is z, so a code read three
//! bits at a time from the top is the octant path from the root down to the
//! cell.

/// Maximum bits per axis that fit in a 64-bit code
pub const MAX_AXIS_BITS: u32 = 21;

const AXIS_MASK: u64 = (1 << MAX_AXIS_BITS) - 1;

fn spread(v: u32) -> u64 {
    let mut v = v as u64 & AXIS_MASK;
    v = (v | (v << 32)) & 0x001f_0000_0000_ffff;
    v = (v | (v << 16)) & 0x001f_0000_ff00_00ff;
    v = (v | (v << 8)) & 0x100f_00f0_0f00_f00f;
    v = (v | (v << 4)) & 0x10c3_0c30_c30c_30c3;
    v = (v | (v << 2)) & 0x1249_2492_4924_9249;
    v
}

fn gather(v: u64) -> u32 {
    let mut v = v & 0x1249_2492_4924_9249;
    v = (v | (v >> 2)) & 0x10c3_0c30_c30c_30c3;
    v = (v | (v >> 4)) & 0x100f_00f0_0f00_f00f;
    v = (v | (v >> 8)) & 0x001f_0000_ff00_00ff;
    v = (v | (v >> 16)) & 0x001f_0000_0000_ffff;
    v = (v | (v >> 32)) & AXIS_MASK;
    v as u32
}

/// Interleave cell coordinates into a Morton code
pub fn interleave(x: u32, y: u32, z: u32) -> u64 {
    spread(x) | (spread(y) << 1) | (spread(z) << 2)
}

/// Split a Morton code back into cell coordinates
pub fn deinterleave(code: u64) -> (u32, u32, u32) {
    (gather(code), gather(code >> 1), gather(code >> 2))
}

/// Cell coordinates reached by walking `octants` down from the root.
///
/// Returns `None` for an octant digit above 7 or a path deeper than
/// [`MAX_AXIS_BITS`].
pub fn cell_from_octants(octants: &[u8]) -> Option<(u32, u32, u32)> {
    if octants.len() > MAX_AXIS_BITS as usize {
        return None;
    }
    let mut code = 0u64;
    for &octant in octants {
        if octant > 7 {
            return None;
        }
        code = (code << 3) | octant as u64;
    }
    Some(deinterleave(code))
}

/// Octant path from the root down to the cell at `depth`
pub fn octants_from_cell(depth: u32, x: u32, y: u32, z: u32) -> Vec<u8> {
    let code = interleave(x, y, z);
    (0..depth)
        .rev()
        .map(|level| ((code >> (level * 3)) & 0b111) as u8)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_layout() {
        assert_eq!(interleave(0, 0, 0), 0);
        assert_eq!(interleave(1, 0, 0), 0b001);
        assert_eq!(interleave(0, 1, 0), 0b010);
        assert_eq!(interleave(0, 0, 1), 0b100);
        assert_eq!(interleave(2, 0, 0), 0b001_000);
        assert_eq!(deinterleave(0b111_111), (3, 3, 3));
    }

    #[test]
    fn test_octant_path() {
        // Depth 2 cell (3, 0, 2): level 1 octant is x=1,z=1 -> 5, level 2 is x=1 -> 1
        assert_eq!(octants_from_cell(2, 3, 0, 2), vec![5, 1]);
        assert_eq!(cell_from_octants(&[5, 1]), Some((3, 0, 2)));
        assert_eq!(cell_from_octants(&[]), Some((0, 0, 0)));
    }

    #[test]
    fn test_invalid_octants() {
        assert_eq!(cell_from_octants(&[8]), None);
        assert_eq!(cell_from_octants(&[0; 22]), None);
    }

    #[test]
    fn test_siblings_are_adjacent() {
        let base = interleave(4, 4, 4);
        for octant in 0..8u32 {
            let code = interleave(4 | (octant & 1), 4 | ((octant >> 1) & 1), 4 | (octant >> 2));
            assert_eq!(code, base + octant as u64);
        }
    }
}
