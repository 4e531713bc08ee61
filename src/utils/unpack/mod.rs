pub mod packerjs;
