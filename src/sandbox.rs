//! 浏览器端求值器的静态黑名单
//!
//! 远端在执行前会拒绝包含这些构造的代码；这里在派发前做同样的检查，违规代码不会离开本进程。

use regex::Regex;

/// 一条黑名单规则
#[derive(Debug, Clone)]
pub struct DenyRule {
    pub label: &'static str,
    pattern: Regex,
}

/// 违规项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub label: &'static str,
    pub line: usize,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (line {})", self.label, self.line)
    }
}

const RULES: &[(&str, &str)] = &[
    ("eval()", r"\beval\s*\("),
    ("Function()", r"\bFunction\s*\("),
    ("document.write", r"\bdocument\s*\.\s*write"),
    ("location assignment", r"\blocation\s*=[^=]"),
    (
        "window dialogs / navigation",
        r"\bwindow\s*\.\s*(open|close|alert|confirm|prompt)\b",
    ),
    ("localStorage", r"\blocalStorage\b"),
    ("sessionStorage", r"\bsessionStorage\b"),
    ("indexedDB", r"\bindexedDB\b"),
    ("fetch()", r"\bfetch\s*\("),
    ("XMLHttpRequest", r"\bXMLHttpRequest\b"),
];

/// 黑名单策略
#[derive(Debug, Clone)]
pub struct SandboxPolicy {
    rules: Vec<DenyRule>,
}

impl SandboxPolicy {
    /// 标准黑名单
    pub fn standard() -> Self {
        let rules = RULES
            .iter()
            .filter_map(|&(label, pattern)| match Regex::new(pattern) {
                Ok(pattern) => Some(DenyRule { label, pattern }),
                Err(e) => {
                    tracing::error!(label, error = %e, "invalid sandbox rule");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    /// 返回全部违规项（按行号）；规则作用于整段代码，跨行拆开的调用同样命中
    pub fn scan(&self, code: &str) -> Vec<Violation> {
        let mut found: Vec<(usize, Violation)> = Vec::new();
        for rule in &self.rules {
            for m in rule.pattern.find_iter(code) {
                found.push((
                    m.start(),
                    Violation {
                        label: rule.label,
                        line: line_of(code, m.start()),
                    },
                ));
            }
        }
        found.sort_by_key(|(offset, _)| *offset);
        found.into_iter().map(|(_, v)| v).collect()
    }

    /// 无违规返回 Ok，否则返回拼好的说明
    pub fn check(&self, code: &str) -> Result<(), String> {
        let violations = self.scan(code);
        if violations.is_empty() {
            return Ok(());
        }
        let list: Vec<String> = violations.iter().map(ToString::to_string).collect();
        Err(format!("code uses forbidden constructs: {}", list.join(", ")))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// 字节偏移所在的行号（从 1 开始）
fn line_of(code: &str, offset: usize) -> usize {
    code.as_bytes()[..offset].iter().filter(|&&b| b == b'\n').count() + 1
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_rules_compile() {
        assert_eq!(SandboxPolicy::standard().rule_count(), RULES.len());
    }

    #[test]
    fn test_clean_scene_code_passes() {
        let code = "const geometry = new THREE.BoxGeometry(1, 1, 1);\n\
                    const material = new THREE.MeshStandardMaterial({ color: 0xff0000 });\n\
                    const cube = new THREE.Mesh(geometry, material);\n\
                    scene.add(cube);";
        assert!(SandboxPolicy::standard().check(code).is_ok());
    }

    #[test]
    fn test_forbidden_constructs_detected() {
        let policy = SandboxPolicy::standard();
        for code in [
            "eval('1+1')",
            "new Function('return 1')()",
            "document.write('x')",
            "window.location = 'http://evil'",
            "window.alert('hi')",
            "localStorage.setItem('a', 1)",
            "fetch('/api')",
            "const xhr = new XMLHttpRequest()",
            "eval\n('alert(1)')",
            "fetch\n('/steal')",
            "window\n.open('http://evil')",
            "document\n.write('x')",
            "location\n= 'http://evil'",
        ] {
            assert!(policy.check(code).is_err(), "not rejected: {code}");
        }
    }

    #[test]
    fn test_location_comparison_allowed() {
        let policy = SandboxPolicy::standard();
        assert!(policy.check("if (location == 'x') {}").is_ok());
        assert!(policy.check("mesh.position.set(0, 1, 0)").is_ok());
    }

    #[test]
    fn test_violation_reports_line() {
        let v = SandboxPolicy::standard().scan("scene.add(a);\nfetch('/x');");
        assert_eq!(v, vec![Violation { label: "fetch()", line: 2 }]);
    }

    #[test]
    fn test_split_call_reports_starting_line() {
        let v = SandboxPolicy::standard().scan("scene.add(a);\nconst r = eval\n  ('1');");
        assert_eq!(v, vec![Violation { label: "eval()", line: 2 }]);
    }
}
