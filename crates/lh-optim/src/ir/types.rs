use anyhow::{ensure, Result};
use std::collections::HashSet;

/// Every block is a 6D transform `[tx, ty, tz, rx, ry, rz]`.
pub const BLOCK_DIM: usize = 6;

/// Identifier for a parameter block, stable within one `ProblemIR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId(pub usize);

/// What a parameter block stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRole {
    /// `master_from_slave` of one slave lighthouse; free.
    SlaveTransform,
    /// A PnP pose of one tracker epoch; held constant.
    EpochPose,
}

#[derive(Debug, Clone)]
pub struct ParamBlock {
    pub id: ParamId,
    pub name: String,
    pub role: BlockRole,
}

impl ParamBlock {
    pub fn is_constant(&self) -> bool {
        self.role == BlockRole::EpochPose
    }
}

/// Robust loss applied to a residual block.
///
/// Each residual block has its own loss, so one block per epoch gives
/// per-epoch robustification.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub enum RobustLoss {
    #[default]
    None,
    Huber {
        scale: f64,
    },
}

/// Consistency of one tracker epoch seen from the master and one slave.
///
/// The residual is 6D: translation error followed by the angle-axis rotation
/// error between the direct and the composed master-frame pose.
#[derive(Debug, Clone)]
pub struct ResidualBlock {
    pub master_from_slave: ParamId,
    pub master_from_tracker: ParamId,
    pub slave_from_tracker: ParamId,
    pub loss: RobustLoss,
}

impl ResidualBlock {
    pub const DIM: usize = 6;

    /// Parameter blocks in the order the factor reads them.
    pub fn params(&self) -> [ParamId; 3] {
        [
            self.master_from_slave,
            self.master_from_tracker,
            self.slave_from_tracker,
        ]
    }
}

/// Unknown blocks and the residuals that reference them by id.
#[derive(Debug, Default, Clone)]
pub struct ProblemIR {
    pub params: Vec<ParamBlock>,
    pub residuals: Vec<ResidualBlock>,
}

impl ProblemIR {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_param_block(&mut self, name: impl Into<String>, role: BlockRole) -> ParamId {
        let id = ParamId(self.params.len());
        self.params.push(ParamBlock {
            id,
            name: name.into(),
            role,
        });
        id
    }

    pub fn add_residual_block(&mut self, residual: ResidualBlock) {
        self.residuals.push(residual);
    }

    fn block(&self, id: ParamId) -> Option<&ParamBlock> {
        self.params.get(id.0)
    }

    /// Check block names are unique and every residual ties a free slave
    /// transform to two constant epoch poses.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for param in &self.params {
            ensure!(
                names.insert(param.name.as_str()),
                "duplicate parameter block {}",
                param.name
            );
        }

        for (idx, residual) in self.residuals.iter().enumerate() {
            let roles = residual.params().map(|id| self.block(id).map(|b| b.role));
            ensure!(
                roles
                    == [
                        Some(BlockRole::SlaveTransform),
                        Some(BlockRole::EpochPose),
                        Some(BlockRole::EpochPose),
                    ],
                "residual {idx} must reference a slave transform and two epoch poses, got {roles:?}"
            );
        }
        Ok(())
    }
}
