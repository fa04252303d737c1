use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Port under which every node publishes its single output.
pub const OUTPUT_PORT: &str = "out";

/// Implicit input port of single-input nodes.
pub const DEFAULT_INPUT_PORT: &str = "in";

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque node identity.
///
/// Assigned once when a node is constructed and never reused within the
/// process, so it can key both the graph and the resource pool.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate a fresh, process-unique identity.
    pub fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value (stable for the node's lifetime).
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Pipeline-wide scheduling options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Upper bound on node executions running at the same time.
    pub max_concurrency: usize,
}

impl SchedulerOptions {
    pub fn with_max_concurrency(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        let max_concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self { max_concurrency }
    }
}

/// Pattern used by `image.synthetic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticPattern {
    /// Every pixel set to `value`.
    Fill,
    /// Horizontal ramp from 0 to `value`.
    Gradient,
    /// Alternating `value` / 0 squares of size `cell`.
    Checker,
}

impl FromStr for SyntheticPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fill" => Ok(SyntheticPattern::Fill),
            "gradient" => Ok(SyntheticPattern::Gradient),
            "checker" => Ok(SyntheticPattern::Checker),
            other => Err(format!(
                "invalid pattern: {other} (expected \"fill\", \"gradient\" or \"checker\")"
            )),
        }
    }
}
