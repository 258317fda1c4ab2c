//! Fixed constants shared between host-side dispatch math and the generated
//! compute passes. The WGSL templates in `framescope-render` are expanded
//! from these values, so host and shader can never disagree.

/// Number of equal-width histogram buckets covering `[min, max)`.
pub const HIST_BUCKETS: usize = 256;

/// Edge length in texels of the square tile reduced by one compute
/// invocation in phase 1.
pub const PIXELS_PER_TILE: u32 = 64;

/// Tiles per block edge; one block is one workgroup of
/// `TILES_PER_BLOCK * TILES_PER_BLOCK` invocations.
pub const TILES_PER_BLOCK: u32 = 16;

/// Texels covered by one block edge.
pub const BLOCK_PIXELS: u32 = PIXELS_PER_TILE * TILES_PER_BLOCK;

/// Largest texture dimension the reduction buffers are sized for.
pub const MAX_TEXTURE_DIM: u32 = 16_384;

/// Worst-case block count at `MAX_TEXTURE_DIM` in both axes.
pub const MAX_BLOCKS: u32 =
    (MAX_TEXTURE_DIM / BLOCK_PIXELS) * (MAX_TEXTURE_DIM / BLOCK_PIXELS);

/// Worst-case tile count across all blocks.
pub const MAX_TILES: u32 = MAX_BLOCKS * TILES_PER_BLOCK * TILES_PER_BLOCK;

/// Capacity of the pick candidate list; hits beyond this are dropped.
pub const MAX_PICK_CANDIDATES: u32 = 500;

/// Invocations per workgroup in the mesh pick pass.
pub const PICK_GROUP_SIZE: u32 = 128;

/// Sentinel sample index meaning "merge every sample".
pub const ALL_SAMPLES: u32 = u32::MAX;

// Phase 1 of the histogram writes one bucket per invocation when flushing
// workgroup-shared counts, so the block shape must cover the bucket array.
const _: () = assert!((TILES_PER_BLOCK * TILES_PER_BLOCK) as usize == HIST_BUCKETS);

// A block must stay within wgpu's default 256 invocations per workgroup.
const _: () = assert!(TILES_PER_BLOCK * TILES_PER_BLOCK <= 256);
