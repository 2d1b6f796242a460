pub mod dense_vec;

pub use dense_vec::DenseVec;
