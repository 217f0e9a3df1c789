use clap::{Parser, ValueEnum};
use loader::Operation;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The classes to load, as binary names (`a.b.C`)
    pub classes: Vec<String>,

    #[arg(long("cp"))]
    /// A list of paths to add to the system classpath
    pub classpath: Vec<String>,

    #[arg(long("resource"))]
    /// Resources to look up through the system loader after loading
    pub resources: Vec<String>,

    #[arg(long("deny"), value_enum)]
    /// Operations the security policy should veto
    pub deny: Vec<DeniedOperation>,

    #[arg(long)]
    /// Whether to run in "test mode", which will emit more machine friendly logs
    pub test: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DeniedOperation {
    CreateClassLoader,
    GetClassLoader,
    GetProtectionDomain,
}

impl From<DeniedOperation> for Operation {
    fn from(value: DeniedOperation) -> Self {
        match value {
            DeniedOperation::CreateClassLoader => Operation::CreateClassLoader,
            DeniedOperation::GetClassLoader => Operation::GetClassLoader,
            DeniedOperation::GetProtectionDomain => Operation::GetProtectionDomain,
        }
    }
}
