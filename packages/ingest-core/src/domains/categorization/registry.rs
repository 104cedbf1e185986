//! The fixed system category registry.
//!
//! Five pre-seeded categories, each with a keyword list, regex patterns,
//! and subcategories. Keywords and patterns are matched against
//! lowercased content, so everything here is lowercase.

use lazy_static::lazy_static;
use regex::Regex;

pub struct SystemCategory {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub patterns: Vec<Regex>,
    pub subcategories: &'static [&'static str],
    /// Hex color for UI rendering of the seeded category.
    pub color: &'static str,
    pub icon: &'static str,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

lazy_static! {
    pub static ref SYSTEM_CATEGORIES: Vec<SystemCategory> = vec![
        SystemCategory {
            name: "Legal",
            keywords: &[
                "contract", "agreement", "terms", "liability", "clause", "legal",
                "whereas", "therefore", "party", "parties", "jurisdiction",
                "confidentiality", "non-disclosure", "nda", "license", "copyright",
                "trademark", "patent", "compliance", "regulation", "statute",
                "amendment", "addendum", "exhibit", "schedule", "appendix",
            ],
            patterns: compile(&[
                r"\b(whereas|therefore|party|parties|agreement)\b",
                r"\b(section|clause|subsection)\s+\d+",
                r"\b(effective date|execution date|termination)\b",
                r"\bhereby\s+(agree|acknowledge|represent)\b",
            ]),
            subcategories: &["Contracts", "Compliance", "Policies", "Legal Notices"],
            color: "#1E40AF",
            icon: "legal",
        },
        SystemCategory {
            name: "Financial",
            keywords: &[
                "invoice", "payment", "financial", "budget", "revenue", "cost",
                "expense", "profit", "loss", "balance", "statement", "report",
                "tax", "accounting", "audit", "fiscal", "quarterly", "annual",
                "accounts", "payable", "receivable", "cash", "flow", "forecast",
            ],
            patterns: compile(&[
                r"\$[\d,]+\.?\d*",
                r"\b(payment|invoice|receipt)\b",
                r"\b(quarterly|annual)\s+(report|statement)\b",
                r"\b(net|gross)\s+(income|profit)\b",
            ]),
            subcategories: &["Invoices", "Reports", "Budgets", "Tax Documents"],
            color: "#059669",
            icon: "financial",
        },
        SystemCategory {
            name: "HR",
            keywords: &[
                "employee", "hiring", "policy", "benefits", "payroll", "recruitment",
                "performance", "review", "evaluation", "training", "development",
                "onboarding", "termination", "resignation", "vacation", "leave",
                "handbook", "manual", "personnel", "staff", "team", "manager",
            ],
            patterns: compile(&[
                r"\b(employee|staff|hr|human resources)\b",
                r"\b(job description|position)\b",
                r"\b(annual review|performance evaluation)\b",
            ]),
            subcategories: &["Policies", "Onboarding", "Performance", "Benefits"],
            color: "#DC2626",
            icon: "users",
        },
        SystemCategory {
            name: "Technical",
            keywords: &[
                "specification", "manual", "documentation", "technical", "api",
                "software", "hardware", "system", "architecture", "design",
                "implementation", "configuration", "installation", "setup",
                "troubleshooting", "maintenance", "upgrade", "migration",
            ],
            patterns: compile(&[
                r"\b(api|endpoint|function|method|class)\b",
                r"\b(version|release)\s+\d+\.\d+",
                r"\b(install|configure|setup)\b",
            ]),
            subcategories: &["Manuals", "Specifications", "Documentation", "APIs"],
            color: "#7C3AED",
            icon: "code",
        },
        SystemCategory {
            name: "Marketing",
            keywords: &[
                "marketing", "campaign", "brand", "content", "social", "media",
                "advertising", "promotion", "strategy", "analysis", "metrics",
                "conversion", "engagement", "reach", "impression", "click",
                "email", "newsletter", "blog", "seo", "sem", "ppc",
            ],
            patterns: compile(&[
                r"\b(campaign|marketing|brand|content)\b",
                r"\b(click.through|conversion) rate\b",
                r"\b(social media|email marketing)\b",
            ]),
            subcategories: &["Campaigns", "Content", "Analysis", "Social Media"],
            color: "#EA580C",
            icon: "megaphone",
        },
    ];
}
