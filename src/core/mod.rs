// Copyright @yucwang 2021

pub mod config;
pub mod rng;
pub mod transfer;
pub mod view;
