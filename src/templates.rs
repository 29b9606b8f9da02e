pub const PYTHON_IMPORTS: &str = include_str!("../templates/python/imports.py");
pub const PYTHON_VARIABLES: &str = include_str!("../templates/python/variables.py");
pub const PYTHON_METHODS: &str = include_str!("../templates/python/methods.py");
pub const PYTHON_MAIN: &str = include_str!("../templates/python/main.py");
pub const PYTHON_END: &str = include_str!("../templates/python/end.py");
pub const PYTHON_REQUIREMENTS: &str = include_str!("../templates/python/requirements.txt");
