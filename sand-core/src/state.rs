//! Block-partitioned primal-dual state.
//!
//! The solution vector of the barrier subproblem is split into nine named
//! blocks. The ordering is fixed and matches the block structure of the
//! Newton system produced by the assembler:
//!
//!   (ρ, u, σ, λ_u, λ_σ, s_l, z_l, s_u, z_u)
//!
//! where:
//! - ρ: filtered material density
//! - u: displacement field
//! - σ: unfiltered material density
//! - λ_u: multiplier on the elasticity constraint
//! - λ_σ: multiplier on the density-filter constraint
//! - s_l, z_l: slack and multiplier for the lower density bound
//! - s_u, z_u: slack and multiplier for the upper density bound

/// Named blocks of the solution vector, in block order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Filtered material density ρ
    Density = 0,
    /// Displacement field u
    Displacement = 1,
    /// Unfiltered material density σ
    UnfilteredDensity = 2,
    /// Multiplier on the elasticity constraint
    DisplacementMultiplier = 3,
    /// Multiplier on the density-filter constraint
    UnfilteredDensityMultiplier = 4,
    /// Slack for the lower density bound (σ ≥ 0)
    DensityLowerSlack = 5,
    /// Multiplier for the lower density bound
    DensityLowerSlackMultiplier = 6,
    /// Slack for the upper density bound (σ ≤ 1)
    DensityUpperSlack = 7,
    /// Multiplier for the upper density bound
    DensityUpperSlackMultiplier = 8,
}

impl Segment {
    /// All nine segments in block order.
    pub const ALL: [Segment; 9] = [
        Segment::Density,
        Segment::Displacement,
        Segment::UnfilteredDensity,
        Segment::DisplacementMultiplier,
        Segment::UnfilteredDensityMultiplier,
        Segment::DensityLowerSlack,
        Segment::DensityLowerSlackMultiplier,
        Segment::DensityUpperSlack,
        Segment::DensityUpperSlackMultiplier,
    ];

    /// Primal decision variables. These blocks enter the curvature and
    /// gradient parts of the penalty-multiplier estimate.
    pub const DECISION: [Segment; 3] = [
        Segment::Density,
        Segment::Displacement,
        Segment::UnfilteredDensity,
    ];

    /// Equality-constraint blocks. Their residuals measure constraint
    /// violation and feed the merit function.
    pub const EQUALITY: [Segment; 4] = [
        Segment::DisplacementMultiplier,
        Segment::UnfilteredDensityMultiplier,
        Segment::DensityLowerSlackMultiplier,
        Segment::DensityUpperSlackMultiplier,
    ];

    /// Blocks advanced with the primal step length.
    pub const PRIMAL_STEP: [Segment; 5] = [
        Segment::Density,
        Segment::Displacement,
        Segment::UnfilteredDensity,
        Segment::DensityLowerSlack,
        Segment::DensityUpperSlack,
    ];

    /// Blocks advanced with the dual step length.
    pub const DUAL_STEP: [Segment; 4] = [
        Segment::DisplacementMultiplier,
        Segment::UnfilteredDensityMultiplier,
        Segment::DensityLowerSlackMultiplier,
        Segment::DensityUpperSlackMultiplier,
    ];

    /// Slack blocks kept strictly positive by the step-size rule.
    pub const SLACKS: [Segment; 2] = [Segment::DensityLowerSlack, Segment::DensityUpperSlack];

    /// Slack-multiplier blocks kept strictly positive by the step-size rule.
    pub const SLACK_MULTIPLIERS: [Segment; 2] = [
        Segment::DensityLowerSlackMultiplier,
        Segment::DensityUpperSlackMultiplier,
    ];

    /// Block index in [0, 9).
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Block vector holding every primal, dual and slack variable.
///
/// Cloning produces an independent deep copy; the watchdog line search relies
/// on this for its rollback snapshots. All arithmetic is elementwise over
/// matching shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockState {
    blocks: [Vec<f64>; 9],
}

impl BlockState {
    /// Zero state with `density_len` entries in each density-like block and
    /// `displacement_len` entries in the displacement and
    /// displacement-multiplier blocks.
    pub fn zeros(density_len: usize, displacement_len: usize) -> Self {
        let blocks = std::array::from_fn(|i| {
            let len = if i == Segment::Displacement.index()
                || i == Segment::DisplacementMultiplier.index()
            {
                displacement_len
            } else {
                density_len
            };
            vec![0.0; len]
        });
        Self { blocks }
    }

    /// Number of entries in the density-like blocks.
    pub fn density_len(&self) -> usize {
        self.blocks[Segment::Density.index()].len()
    }

    /// Number of entries in the displacement blocks.
    pub fn displacement_len(&self) -> usize {
        self.blocks[Segment::Displacement.index()].len()
    }

    /// Read access to one block.
    pub fn block(&self, seg: Segment) -> &[f64] {
        &self.blocks[seg.index()]
    }

    /// Write access to one block.
    pub fn block_mut(&mut self, seg: Segment) -> &mut [f64] {
        &mut self.blocks[seg.index()]
    }

    /// self += other, elementwise.
    pub fn add_assign(&mut self, other: &Self) {
        self.axpy(1.0, other);
    }

    /// self += alpha * other, elementwise.
    pub fn axpy(&mut self, alpha: f64, other: &Self) {
        for (mine, theirs) in self.blocks.iter_mut().zip(other.blocks.iter()) {
            debug_assert_eq!(mine.len(), theirs.len());
            for (x, y) in mine.iter_mut().zip(theirs.iter()) {
                *x += alpha * y;
            }
        }
    }

    /// Scale every entry by `alpha`.
    pub fn scale(&mut self, alpha: f64) {
        for block in self.blocks.iter_mut() {
            for x in block.iter_mut() {
                *x *= alpha;
            }
        }
    }

    /// Scale one block by `alpha`.
    pub fn scale_block(&mut self, seg: Segment, alpha: f64) {
        for x in self.blocks[seg.index()].iter_mut() {
            *x *= alpha;
        }
    }

    /// a * x + b * y, elementwise, as a fresh state.
    pub fn linear_combination(a: f64, x: &Self, b: f64, y: &Self) -> Self {
        let mut out = x.clone();
        out.scale(a);
        out.axpy(b, y);
        out
    }

    /// l1 norm over all blocks.
    pub fn l1_norm(&self) -> f64 {
        self.blocks
            .iter()
            .map(|block| block.iter().map(|x| x.abs()).sum::<f64>())
            .sum()
    }

    /// linf norm over all blocks.
    pub fn linf_norm(&self) -> f64 {
        self.blocks
            .iter()
            .map(|block| block.iter().map(|x| x.abs()).fold(0.0_f64, f64::max))
            .fold(0.0_f64, f64::max)
    }

    /// l1 norm of one block.
    pub fn block_l1_norm(&self, seg: Segment) -> f64 {
        self.blocks[seg.index()].iter().map(|x| x.abs()).sum()
    }

    /// linf norm of one block.
    pub fn block_linf_norm(&self, seg: Segment) -> f64 {
        self.blocks[seg.index()]
            .iter()
            .map(|x| x.abs())
            .fold(0.0_f64, f64::max)
    }

    /// True iff every entry of the block is >= 0.
    pub fn block_is_non_negative(&self, seg: Segment) -> bool {
        self.blocks[seg.index()].iter().all(|&x| x >= 0.0)
    }

    /// True iff every entry of the block is > 0.
    pub fn block_is_strictly_positive(&self, seg: Segment) -> bool {
        self.blocks[seg.index()].iter().all(|&x| x > 0.0)
    }

    /// True iff no entry is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.blocks
            .iter()
            .all(|block| block.iter().all(|x| x.is_finite()))
    }
}
