pub mod bga;
pub mod entomology;
pub mod webdriver;
