mod backend;
mod backends;
mod result;

pub use backend::ObjectDetector;
pub use backends::StubObjectDetector;
pub use result::{BBox, ObjectBox, PERSON_LABEL};
