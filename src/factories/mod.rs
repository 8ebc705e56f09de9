pub mod switch_factory;
