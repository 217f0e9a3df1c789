use assert_cmd::{assert::Assert, Command};

pub fn input() -> CliInput {
    CliInput {
        classpath: vec![],
        classes: vec![],
        resources: vec![],
        deny: vec![],
    }
}

#[derive(Debug)]
pub struct CliInput {
    classpath: Vec<String>,
    classes: Vec<String>,
    resources: Vec<String>,
    deny: Vec<&'static str>,
}

impl CliInput {
    pub fn classpath(mut self, path: impl Into<String>) -> Self {
        self.classpath.push(path.into());
        self
    }

    pub fn class(mut self, name: impl Into<String>) -> Self {
        self.classes.push(name.into());
        self
    }

    pub fn resource(mut self, name: impl Into<String>) -> Self {
        self.resources.push(name.into());
        self
    }

    pub fn deny(mut self, operation: &'static str) -> Self {
        self.deny.push(operation);
        self
    }
}

pub fn exec_cli(input: CliInput) -> Assert {
    let mut cargo_cmd = Command::cargo_bin("cli").expect("cargo to locate cli");
    let cmd = cargo_cmd.arg("--test");

    for cp in input.classpath {
        cmd.arg("--cp").arg(cp);
    }

    for name in input.resources {
        cmd.arg("--resource").arg(name);
    }

    for op in input.deny {
        cmd.arg("--deny").arg(op);
    }

    cmd.args(input.classes);
    cmd.assert()
}
