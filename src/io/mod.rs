// Copyright @yucwang 2021

pub mod mask_reader;
pub mod png_utils;
pub mod slice_reader;
