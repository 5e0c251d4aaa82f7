mod stub;

pub use stub::StubObjectDetector;
