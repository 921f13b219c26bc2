// Copyright @yucwang 2026

pub mod ingest;
pub mod scan;
pub mod voxel;
