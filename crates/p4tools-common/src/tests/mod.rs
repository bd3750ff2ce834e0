mod model;
mod symbolic_env;
