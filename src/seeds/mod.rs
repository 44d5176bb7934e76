pub mod questions_seed;
