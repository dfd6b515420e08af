#![cfg(test)]

mod test_shapes;
