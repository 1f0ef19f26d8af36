use crate::models::{Finding, Severity};

pub struct GroupView<'a> {
    entries: Vec<GroupEntry<'a>>,
}

pub struct GroupEntry<'a> {
    pub name: String,
    pub findings: Vec<&'a Finding>,
}

impl GroupEntry<'_> {
    pub fn max_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }
}

impl<'a> GroupView<'a> {
    pub fn by(findings: &'a [Finding], key: impl Fn(&Finding) -> String) -> Self {
        let mut entries: Vec<GroupEntry<'a>> = Vec::new();

        for finding in findings {
            let name = key(finding);
            match entries.iter_mut().find(|e| e.name == name) {
                Some(entry) => entry.findings.push(finding),
                None => entries.push(GroupEntry {
                    name,
                    findings: vec![finding],
                }),
            }
        }

        Self { entries }
    }

    pub fn by_detail(findings: &'a [Finding], detail: &str) -> Self {
        Self::by(findings, |f| f.detail_str(detail).unwrap_or("Other").to_string())
    }

    pub fn by_kind(findings: &'a [Finding]) -> Self {
        Self::by(findings, |f| f.kind.to_string())
    }

    pub fn entries(&self) -> &[GroupEntry<'a>] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&GroupEntry<'a>> {
        self.entries.iter().find(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FindingKind, ToolId};

    fn tech(name: &str, category: &str) -> Finding {
        Finding::info(ToolId::WebTechFp, FindingKind::Technology, name, name).with_detail("category", category)
    }

    #[test]
    fn test_group_by_category_preserves_order() {
        let findings = vec![
            tech("React", "Framework"),
            tech("nginx", "Server/CDN"),
            tech("Vue.js", "Framework"),
            Finding::low(ToolId::WebTechFp, FindingKind::Info, "PHP", "php"),
        ];
        let view = GroupView::by_detail(&findings, "category");

        let names: Vec<_> = view.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Framework", "Server/CDN", "Other"]);
        let frameworks = view.get("Framework").unwrap();
        assert_eq!(frameworks.findings.iter().map(|f| f.title.as_str()).collect::<Vec<_>>(), vec!["React", "Vue.js"]);
        assert_eq!(view.get("Other").unwrap().max_severity(), Some(Severity::Low));
    }

    #[test]
    fn test_group_by_kind() {
        let findings = vec![tech("React", "Framework"), Finding::low(ToolId::WebTechFp, FindingKind::Info, "x", "x")];
        assert_eq!(GroupView::by_kind(&findings).entries().len(), 2);
    }
}
