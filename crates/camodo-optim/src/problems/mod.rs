//! Graph builders for the joint calibration problems.

pub mod joint_graph;
