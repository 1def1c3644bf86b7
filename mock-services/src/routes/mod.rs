pub mod aquarius;
pub mod brizo;
pub mod health;
