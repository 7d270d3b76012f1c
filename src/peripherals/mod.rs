pub mod bmp280;

pub use bmp280::BMP280;
