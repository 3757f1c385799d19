/// Written by `init` next to the config as a starting point for `questions import`.
pub const QUESTIONS_YAML: &str = r#"# normeval question set
# number must be unique; flags are optional.
questions:
  - number: 2
    text: "Qual a largura mínima das saídas de emergência em edificações de ocupação residencial, conforme NT-11?"
    expected_answer: "1,20 m"
    norm: "NT-11"
    item: "5.5.1"
    flags:
      interesting: true
  - number: 3
    text: "Em que situação é exigido o sistema de hidrantes em edificações com área construída superior a 750 m², conforme NT-22?"
    expected_answer: "Edificações com área construída superior a 750 m² ou altura superior a 12 m"
    norm: "NT-22"
    item: "5.1"
"#;

pub const GITIGNORE: &str = "normeval.db\nnormeval.db-journal\n*.results.json\n";
