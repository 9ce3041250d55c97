pub mod font;
pub mod input;
pub mod sdcard;
pub mod st7789;
