//! Node identity for distributed load tests.

use std::fmt;

/// The role this process plays in the load test.
///
/// Every point carries the role as its `node_id` dimension so dashboards
/// can split traffic by origin when the test runs distributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeRole {
    /// Single-process test, neither master nor worker.
    #[default]
    Local,
    /// The coordinating process of a distributed test.
    Master,
    /// A load-generating process of a distributed test.
    Worker,
}

impl NodeRole {
    /// Resolve the role from process arguments.
    ///
    /// `--master` selects [`NodeRole::Master`] and `--worker` selects
    /// [`NodeRole::Worker`]; when both appear the worker flag wins, in
    /// either order. Anything else leaves the role at
    /// [`NodeRole::Local`].
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut role = NodeRole::Local;
        for arg in args {
            match arg.as_ref() {
                "--master" if role != NodeRole::Worker => role = NodeRole::Master,
                "--worker" => role = NodeRole::Worker,
                _ => {}
            }
        }
        role
    }

    /// The dimension value written for this role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NodeRole::Local => "local",
            NodeRole::Master => "master",
            NodeRole::Worker => "worker",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
