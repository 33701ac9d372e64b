//! Pass configuration.

use serde::{Deserialize, Serialize};

/// Device string a node must carry, byte for byte, for any rule to
/// apply to it. Nodes on any other device pass through untouched.
pub const DEFAULT_CPU_DEVICE: &str = "/job:localhost/replica:0/task:0/device:CPU:0";

/// Name prefix of synthesized layout-metadata constants (`DMT/_0`,
/// `DMT/_1`, ...).
pub const LAYOUT_CONST_PREFIX: &str = "DMT";

/// How data tensors and their paired layout-metadata tensors are laid
/// out in a rewritten node's slot list.
///
/// `Contiguous` puts all data slots first and all layout slots after
/// them, preserving relative order within each group; `Interleaved`
/// alternates data and layout slots pairwise. Workspace slots trail
/// the interleaved list. The slot arithmetic lives here so every
/// engine applies one convention consistently.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TensorOrdering {
    #[default]
    Contiguous,
    Interleaved,
}

impl TensorOrdering {
    /// Input slot of data tensor `i` out of `n`, on a node that does
    /// (`workspace`) or does not reserve a workspace input.
    pub fn data_input_slot(self, i: usize, _n: usize, _workspace: bool) -> usize {
        match self {
            TensorOrdering::Contiguous => i,
            TensorOrdering::Interleaved => 2 * i,
        }
    }

    /// Input slot of the layout tensor paired with data tensor `i`.
    pub fn layout_input_slot(self, i: usize, n: usize, workspace: bool) -> usize {
        match self {
            TensorOrdering::Contiguous => n + usize::from(workspace) + i,
            TensorOrdering::Interleaved => 2 * i + 1,
        }
    }

    /// Input slot reserved for the workspace tensor.
    pub fn workspace_input_slot(self, n: usize) -> usize {
        match self {
            TensorOrdering::Contiguous => n,
            TensorOrdering::Interleaved => 2 * n,
        }
    }

    /// Input slot reserved for the workspace tensor's layout companion.
    pub fn workspace_layout_input_slot(self, n: usize) -> usize {
        2 * n + 1
    }

    /// Output slot of data output `s`.
    pub fn data_output_slot(self, s: usize) -> usize {
        match self {
            TensorOrdering::Contiguous => s,
            TensorOrdering::Interleaved => 2 * s,
        }
    }

    /// Output slot of the layout companion of data output `s`, on a
    /// node with `m` data outputs.
    pub fn layout_output_slot(self, s: usize, m: usize) -> usize {
        match self {
            TensorOrdering::Contiguous => m + s,
            TensorOrdering::Interleaved => 2 * s + 1,
        }
    }

    /// Layout output port paired with the data output behind absolute
    /// output `port`, if `port` is in fact a data output.
    pub fn layout_port_for_data_port(self, port: usize, m: usize) -> Option<usize> {
        match self {
            TensorOrdering::Contiguous => (port < m).then(|| m + port),
            TensorOrdering::Interleaved => {
                (port % 2 == 0 && port / 2 < m).then(|| port + 1)
            }
        }
    }
}

/// Configuration for one invocation of the layout pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PassConfig {
    /// The device string rewritten nodes must be assigned to.
    pub cpu_device: String,
    /// Slot ordering convention for data/layout tensor pairs.
    pub ordering: TensorOrdering,
    /// Bound on the backward dataflow search of context rules.
    pub context_depth: usize,
}

impl Default for PassConfig {
    fn default() -> Self {
        PassConfig {
            cpu_device: DEFAULT_CPU_DEVICE.to_string(),
            ordering: TensorOrdering::Contiguous,
            context_depth: 10,
        }
    }
}

impl PassConfig {
    pub fn with_cpu_device(device: impl Into<String>) -> Self {
        PassConfig {
            cpu_device: device.into(),
            ..Default::default()
        }
    }
}
