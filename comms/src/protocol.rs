type HeaderType = u32;
pub const HEADER_SIZE: usize = size_of::<HeaderType>();
pub type Header = [u8; HEADER_SIZE];

const CONTROL_H: HeaderType = 1;
const GRAD_H: HeaderType = 2;
const REDUCED_H: HeaderType = 3;
const PARAMS_H: HeaderType = 4;

pub const CONTROL: Header = CONTROL_H.to_be_bytes();
pub const GRAD: Header = GRAD_H.to_be_bytes();
pub const REDUCED: Header = REDUCED_H.to_be_bytes();
pub const PARAMS: Header = PARAMS_H.to_be_bytes();
