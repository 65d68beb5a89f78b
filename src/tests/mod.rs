#[cfg(test)]
mod lifecycle;
