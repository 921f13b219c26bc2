// Copyright 2020 @TwoCookingMice

pub mod bitmap;
pub mod buffer;
pub mod constants;
pub mod grid;
pub mod transform;
