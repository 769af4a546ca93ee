mod hanging;
mod mesh;
mod p_refinement;
mod tree;
