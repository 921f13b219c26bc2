// Copyright @yucwang 2026

use std::ops;

/// Host-side stand-in for a 2D image binding. The raytrace stages use these
/// as their ray-position, ray-direction and accumulation "textures", all of
/// them sized (output width * samples) x height.
#[derive(Debug, Clone)]
pub struct Buffer2D<T> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Copy + Default> Buffer2D<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            data: vec![T::default(); width * height],
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn fill(&mut self, value: T) {
        for texel in self.data.iter_mut() {
            *texel = value;
        }
    }
}

impl<T> ops::Index<(usize, usize)> for Buffer2D<T> {
    type Output = T;

    fn index(&self, index: (usize, usize)) -> &T {
        &self.data[index.0 + self.width * index.1]
    }
}

impl<T> ops::IndexMut<(usize, usize)> for Buffer2D<T> {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut T {
        &mut self.data[index.0 + self.width * index.1]
    }
}
